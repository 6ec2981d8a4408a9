//! In-memory fakes for the reader and gateway seams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use notifier_core::error::{GatewayError, StorageError};
use notifier_core::models::{Device, SignalId, SignalRecord};
use notifier_data::reader::SignalSource;

use crate::gateway::NotificationGateway;

pub fn record(
    id: i64,
    home: &str,
    away: &str,
    refer: &str,
    signal: &str,
    league: &str,
) -> SignalRecord {
    SignalRecord {
        id: SignalId::from(id),
        home_team: home.to_string(),
        away_team: away.to_string(),
        refer_team: refer.to_string(),
        signal: signal.to_string(),
        league: league.to_string(),
    }
}

// ── FakeSource ────────────────────────────────────────────────────────────────

pub struct FakeSource {
    signals: Mutex<Vec<SignalRecord>>,
    devices: Mutex<Vec<Device>>,
    fail_signals: AtomicBool,
    fail_devices: AtomicBool,
    reads: AtomicUsize,
}

impl FakeSource {
    pub fn new(signals: Vec<SignalRecord>, devices: Vec<Device>) -> Self {
        Self {
            signals: Mutex::new(signals),
            devices: Mutex::new(devices),
            fail_signals: AtomicBool::new(false),
            fail_devices: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set_signals(&self, signals: Vec<SignalRecord>) {
        *self.signals.lock().unwrap() = signals;
    }

    pub fn fail_signals(&self, fail: bool) {
        self.fail_signals.store(fail, Ordering::SeqCst);
    }

    pub fn fail_devices(&self, fail: bool) {
        self.fail_devices.store(fail, Ordering::SeqCst);
    }

    /// Number of signal reads attempted so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for FakeSource {
    async fn fetch_pending_signals(&self) -> Result<Vec<SignalRecord>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_signals.load(Ordering::SeqCst) {
            return Err(StorageError::Connect("connection refused".to_string()));
        }
        Ok(self.signals.lock().unwrap().clone())
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>, StorageError> {
        if self.fail_devices.load(Ordering::SeqCst) {
            return Err(StorageError::Query {
                query: "devices",
                message: "relation does not exist".to_string(),
            });
        }
        Ok(self.devices.lock().unwrap().clone())
    }
}

// ── FakeGateway ───────────────────────────────────────────────────────────────

/// Records every `(message, device)` call; fails for configured devices.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(devices: &[&str]) -> Self {
        Self {
            calls: Mutex::default(),
            failing: devices.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for FakeGateway {
    async fn send(&self, message: &str, device: &Device) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((message.to_string(), device.player_id().to_string()));

        // Yield so concurrent sends actually interleave.
        tokio::task::yield_now().await;

        if self.failing.contains(device.player_id()) {
            Err(GatewayError::Status {
                status: 400,
                body: "invalid player id".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
