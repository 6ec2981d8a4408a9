//! Interval-driven polling orchestrator.
//!
//! Runs a [`Dispatcher`] inside a single tokio task: one cycle immediately on
//! start, then one per tick. Ticks that fall due while a cycle is still running
//! are delayed, so cycles never overlap and the dedup set needs no lock.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use notifier_data::reader::SignalSource;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

use crate::dispatcher::Dispatcher;
use crate::gateway::NotificationGateway;

// ── PollOrchestrator ──────────────────────────────────────────────────────────

/// Background poll scheduler.
///
/// Call [`PollOrchestrator::start`] to spawn the loop and obtain a
/// [`OrchestratorHandle`].
pub struct PollOrchestrator<S, G> {
    dispatcher: Dispatcher<S, G>,
    /// Time between the starts of consecutive cycles.
    poll_interval: Duration,
}

impl<S, G> PollOrchestrator<S, G>
where
    S: SignalSource + 'static,
    G: NotificationGateway + 'static,
{
    pub fn new(dispatcher: Dispatcher<S, G>, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            poll_interval,
        }
    }

    /// Spawn the polling loop on the current tokio runtime.
    pub fn start(self) -> OrchestratorHandle {
        let (cycles_tx, cycles_rx) = watch::channel(0_u64);

        let handle = tokio::spawn(async move {
            self.polling_loop(cycles_tx).await;
        });

        OrchestratorHandle {
            handle,
            cycles: cycles_rx,
        }
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn polling_loop(mut self, cycles_tx: watch::Sender<u64>) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs_f64(),
            "signal poller started"
        );

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut completed: u64 = 0;
        loop {
            // The first tick completes immediately.
            interval.tick().await;

            self.guarded_cycle().await;

            completed += 1;
            tracing::debug!(cycle = completed, "poll cycle finished");
            cycles_tx.send_replace(completed);
        }
    }

    /// Run one cycle, containing any panic so the loop keeps going.
    async fn guarded_cycle(&mut self) {
        let outcome = AssertUnwindSafe(self.dispatcher.poll()).catch_unwind().await;
        if let Err(panic) = outcome {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%reason, "poll cycle panicked; continuing with next cycle");
        }
    }
}

// ── OrchestratorHandle ────────────────────────────────────────────────────────

/// A handle to the background polling task.
pub struct OrchestratorHandle {
    handle: JoinHandle<()>,
    cycles: watch::Receiver<u64>,
}

impl OrchestratorHandle {
    /// Immediately abort the polling loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Handle that aborts the loop without owning it.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Receiver tracking the number of finished cycles, aborted ones included.
    ///
    /// The binary reports the final count on shutdown.
    pub fn cycles(&self) -> watch::Receiver<u64> {
        self.cycles.clone()
    }

    /// Wait for the loop to end. It only ends when aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, FakeGateway, FakeSource};
    use async_trait::async_trait;
    use notifier_core::error::GatewayError;
    use notifier_core::models::Device;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn wait_for_cycles(rx: &mut watch::Receiver<u64>, n: u64) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|c| *c >= n))
            .await
            .expect("timed out waiting for cycles")
            .expect("orchestrator stopped");
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let source = Arc::new(FakeSource::new(
            vec![record(1, "A", "B", "A", "BUY", "X")],
            vec![Device::new("d1"), Device::new("d2")],
        ));
        let gateway = Arc::new(FakeGateway::new());
        let dispatcher = Dispatcher::new(source.clone(), gateway.clone());

        // Long interval: only the immediate cycle can run within the test.
        let handle = PollOrchestrator::new(dispatcher, Duration::from_secs(3600)).start();
        let mut cycles = handle.cycles();
        wait_for_cycles(&mut cycles, 1).await;

        assert_eq!(gateway.calls().len(), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_repeated_cycles_do_not_resend() {
        let source = Arc::new(FakeSource::new(
            vec![record(1, "A", "B", "A", "BUY", "X")],
            vec![Device::new("d1")],
        ));
        let gateway = Arc::new(FakeGateway::new());
        let dispatcher = Dispatcher::new(source.clone(), gateway.clone());

        let handle = PollOrchestrator::new(dispatcher, Duration::from_millis(10)).start();
        let mut cycles = handle.cycles();
        wait_for_cycles(&mut cycles, 4).await;

        assert!(source.reads() >= 4);
        assert_eq!(gateway.calls().len(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_loop_survives_storage_failures() {
        let source = Arc::new(FakeSource::new(
            vec![record(1, "A", "B", "A", "BUY", "X")],
            vec![Device::new("d1")],
        ));
        source.fail_signals(true);
        let gateway = Arc::new(FakeGateway::new());
        let dispatcher = Dispatcher::new(source.clone(), gateway.clone());

        let handle = PollOrchestrator::new(dispatcher, Duration::from_millis(10)).start();
        let mut cycles = handle.cycles();
        wait_for_cycles(&mut cycles, 2).await;
        assert!(gateway.calls().is_empty());

        source.fail_signals(false);
        let seen = *cycles.borrow();
        wait_for_cycles(&mut cycles, seen + 2).await;
        assert_eq!(gateway.calls().len(), 1);
        handle.abort();
    }

    /// Panics on its first call, succeeds afterwards.
    struct PanickyGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationGateway for PanickyGateway {
        async fn send(&self, _message: &str, _device: &Device) -> Result<(), GatewayError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("gateway exploded");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loop_survives_panicking_cycle() {
        let source = Arc::new(FakeSource::new(
            vec![record(1, "A", "B", "A", "BUY", "X")],
            vec![Device::new("d1")],
        ));
        let gateway = Arc::new(PanickyGateway {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(source.clone(), gateway.clone());

        let handle = PollOrchestrator::new(dispatcher, Duration::from_millis(10)).start();
        let mut cycles = handle.cycles();
        wait_for_cycles(&mut cycles, 3).await;

        // The panicking cycle never marked the signal, so the next one sent it.
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_join_reports_cancellation_after_abort() {
        let source = Arc::new(FakeSource::new(vec![], vec![]));
        let dispatcher = Dispatcher::new(source, Arc::new(FakeGateway::new()));

        let handle = PollOrchestrator::new(dispatcher, Duration::from_secs(60)).start();
        handle.abort_handle().abort();

        let err = handle.join().await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
