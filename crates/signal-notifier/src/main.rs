mod bootstrap;

use anyhow::Result;
use notifier_core::settings::Settings;
use notifier_runtime::orchestrator::PollOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    settings.validate()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Signal notifier v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?settings, "resolved settings");

    let dispatcher = bootstrap::build_dispatcher(&settings)?;

    let handle = PollOrchestrator::new(dispatcher, settings.poll_interval()).start();
    let abort = handle.abort_handle();
    let cycles = handle.cycles();

    tokio::select! {
        result = handle.join() => {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                cycles = *cycles.borrow(),
                "Ctrl+C received; stopping signal poller"
            );
            abort.abort();
        }
    }

    Ok(())
}
