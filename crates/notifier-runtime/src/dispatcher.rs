//! One poll cycle: read, dedup, fan out, mark.
//!
//! [`Dispatcher`] owns the [`DispatchedSet`]. A signal is marked only after a
//! send has been attempted for every device, and it is marked whatever the
//! individual outcomes were, so a device that failed is never retried for
//! that signal.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use notifier_core::dispatched::DispatchedSet;
use notifier_core::error::StorageError;
use notifier_core::message::compose_message;
use notifier_core::models::{Device, SignalRecord};
use notifier_data::reader::SignalSource;

use crate::gateway::NotificationGateway;

// ── CycleReport ───────────────────────────────────────────────────────────────

/// Counters for one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Rows returned by the signal query.
    pub signals_read: usize,
    /// Rows returned by the device query.
    pub devices_read: usize,
    /// Signals fanned out and marked during this cycle.
    pub dispatched: usize,
    /// Signals skipped because they were already in the dedup set.
    pub skipped: usize,
    pub sends_attempted: usize,
    pub sends_failed: usize,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, signals_read: usize, devices_read: usize) -> Self {
        Self {
            started_at,
            signals_read,
            devices_read,
            dispatched: 0,
            skipped: 0,
            sends_attempted: 0,
            sends_failed: 0,
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Runs poll cycles against a [`SignalSource`] and a [`NotificationGateway`].
pub struct Dispatcher<S, G> {
    source: S,
    gateway: G,
    dispatched: DispatchedSet,
    /// Devices notified concurrently per signal; 1 means strictly sequential.
    send_concurrency: usize,
}

impl<S: SignalSource, G: NotificationGateway> Dispatcher<S, G> {
    /// Create a dispatcher with an empty dedup set and sequential sends.
    pub fn new(source: S, gateway: G) -> Self {
        Self::with_dispatched(source, gateway, DispatchedSet::new())
    }

    /// Create a dispatcher around an existing dedup set.
    pub fn with_dispatched(source: S, gateway: G, dispatched: DispatchedSet) -> Self {
        Self {
            source,
            gateway,
            dispatched,
            send_concurrency: 1,
        }
    }

    /// Allow up to `n` concurrent sends per signal (clamped to at least 1).
    pub fn with_send_concurrency(mut self, n: usize) -> Self {
        self.send_concurrency = n.max(1);
        self
    }

    pub fn dispatched(&self) -> &DispatchedSet {
        &self.dispatched
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Scheduler entry point. Runs one cycle and logs, never propagates.
    pub async fn poll(&mut self) {
        match self.run_cycle().await {
            Ok(report) => {
                tracing::debug!(
                    signals = report.signals_read,
                    devices = report.devices_read,
                    dispatched = report.dispatched,
                    skipped = report.skipped,
                    sends_failed = report.sends_failed,
                    tracked = self.dispatched.len(),
                    "poll cycle complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "poll cycle aborted");
            }
        }
    }

    /// Run one full cycle.
    ///
    /// Both reads happen before anything else, so a [`StorageError`] leaves
    /// the dedup set untouched and no notification is sent.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, StorageError> {
        tracing::info!("checking for new signals");
        let started_at = Utc::now();

        let signals = self.source.fetch_pending_signals().await?;
        let devices = self.source.fetch_devices().await?;

        let mut report = CycleReport::new(started_at, signals.len(), devices.len());

        for record in &signals {
            if self.dispatched.contains(&record.id) {
                report.skipped += 1;
                continue;
            }

            let failed = self.fan_out(record, &devices).await;
            report.sends_attempted += devices.len();
            report.sends_failed += failed;
            report.dispatched += 1;

            self.dispatched.mark_dispatched(record.id.clone());
            tracing::info!(
                signal_id = %record.id,
                devices = devices.len(),
                failed,
                "signal dispatched"
            );
        }

        Ok(report)
    }

    /// Send `record` to every device and return how many sends failed.
    ///
    /// Returns only after every send has finished.
    async fn fan_out(&self, record: &SignalRecord, devices: &[Device]) -> usize {
        let message = compose_message(record);
        let gateway = &self.gateway;
        let message = message.as_str();

        if self.send_concurrency <= 1 {
            let mut failed = 0;
            for device in devices {
                if gateway.send(message, device).await.is_err() {
                    failed += 1;
                }
            }
            return failed;
        }

        stream::iter(devices)
            .map(|device| async move { gateway.send(message, device).await.is_err() })
            .buffer_unordered(self.send_concurrency)
            .fold(0, |acc, failed| async move { acc + usize::from(failed) })
            .boxed()
            .await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
