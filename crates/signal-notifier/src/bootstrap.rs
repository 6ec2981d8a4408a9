use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use notifier_core::error::{NotifierError, Result};
use notifier_core::settings::Settings;
use notifier_data::reader::{parse_ssl_mode, PostgresSignalSource, StorageConfig};
use notifier_runtime::dispatcher::Dispatcher;
use notifier_runtime::gateway::{GatewayConfig, OneSignalGateway};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a settings log-level name to an [`EnvFilter`] directive.
///
/// Unknown names are passed through so `RUST_LOG`-style directives still work.
pub fn filter_directive(log_level: &str) -> String {
    let upper = log_level.to_uppercase();
    match upper.as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr, and additionally to `log_file` (appended) when set.
/// Falls back to `"info"` if the level string is not a valid directive.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let filter =
        EnvFilter::try_new(filter_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_target(false).with_thread_ids(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| NotifierError::Config(format!("logging already initialised: {}", e)))?;

    Ok(())
}

// ── Component configuration ────────────────────────────────────────────────────

pub fn storage_config(settings: &Settings) -> Result<StorageConfig> {
    let ssl_mode = parse_ssl_mode(&settings.db_sslmode).ok_or_else(|| {
        NotifierError::Config(format!(
            "--db-sslmode must be disable, prefer or require, got {:?}",
            settings.db_sslmode
        ))
    })?;

    Ok(StorageConfig {
        host: settings.db_host.clone(),
        port: settings.db_port,
        dbname: settings.db_name.clone(),
        user: settings.db_user.clone(),
        password: settings.db_password.clone(),
        connect_timeout: settings.connect_timeout(),
        ssl_mode,
        ssl_root_cert: settings.db_sslrootcert.clone(),
    })
}

pub fn gateway_config(settings: &Settings) -> GatewayConfig {
    GatewayConfig {
        api_url: settings.onesignal_api_url.clone(),
        app_id: settings.onesignal_app_id.clone(),
        api_key: settings.onesignal_api_key.clone(),
        request_timeout: settings.request_timeout(),
    }
}

/// Wire the Postgres reader and the OneSignal client into a dispatcher.
pub fn build_dispatcher(
    settings: &Settings,
) -> Result<Dispatcher<PostgresSignalSource, OneSignalGateway>> {
    let source = PostgresSignalSource::new(storage_config(settings)?)?;
    let gateway = OneSignalGateway::new(gateway_config(settings))?;

    Ok(Dispatcher::new(source, gateway).with_send_concurrency(settings.send_concurrency as usize))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use notifier_core::error::StorageError;
    use notifier_data::reader::SslMode;
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings() -> Settings {
        settings_with(&[])
    }

    fn settings_with(extra: &[&str]) -> Settings {
        let mut args = vec![
            "signal-notifier",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--db-name",
            "signals",
            "--db-user",
            "worker",
            "--db-password",
            "s3cret",
            "--onesignal-app-id",
            "app-123",
            "--onesignal-api-key",
            "key-456",
            "--request-timeout-secs",
            "7",
            "--connect-timeout-secs",
            "3",
        ];
        args.extend_from_slice(extra);
        Settings::try_load_from(args).expect("parse")
    }

    #[test]
    fn test_filter_directive_mapping() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("error"), "error");
        assert_eq!(filter_directive("notifier_runtime=trace"), "notifier_runtime=trace");
    }

    #[test]
    fn test_storage_config_from_settings() {
        let config = storage_config(&settings()).expect("storage config");
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.dbname, "signals");
        assert_eq!(config.user, "worker");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.ssl_mode, SslMode::Prefer);
        assert!(config.ssl_root_cert.is_none());
    }

    #[test]
    fn test_storage_config_maps_sslmode() {
        let config = storage_config(&settings_with(&["--db-sslmode", "require"]))
            .expect("storage config");
        assert_eq!(config.ssl_mode, SslMode::Require);
    }

    #[test]
    fn test_storage_config_rejects_unsupported_sslmode() {
        let mut settings = settings();
        settings.db_sslmode = "verify-full".to_string();

        let err = storage_config(&settings).unwrap_err();
        assert!(matches!(err, NotifierError::Config(_)));
        assert!(err.to_string().contains("verify-full"));
    }

    #[test]
    fn test_build_dispatcher_from_settings() {
        let dispatcher =
            build_dispatcher(&settings_with(&["--send-concurrency", "4"])).expect("dispatcher");
        assert_eq!(dispatcher.source().config().port, 6543);
        assert!(dispatcher.dispatched().is_empty());
    }

    #[test]
    fn test_build_dispatcher_reports_unreadable_root_cert() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("missing-ca.pem");
        let mut settings = settings();
        settings.db_sslrootcert = Some(missing);

        let err = build_dispatcher(&settings).err().expect("missing root cert");
        assert!(matches!(err, NotifierError::Storage(StorageError::Tls(_))));
    }

    #[test]
    fn test_gateway_config_from_settings() {
        let config = gateway_config(&settings());
        assert_eq!(
            config.api_url,
            notifier_core::settings::DEFAULT_ONESIGNAL_API_URL
        );
        assert_eq!(config.app_id, "app-123");
        assert_eq!(config.api_key, "key-456");
        assert_eq!(config.request_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_setup_logging_creates_log_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("logs").join("notifier.log");

        // Another test may already own the global subscriber; the file is
        // opened before installation either way.
        let _ = setup_logging("INFO", Some(&path));

        assert!(path.exists(), "log file must be created");
    }

    #[test]
    fn test_setup_logging_unwritable_path_is_io_error() {
        let tmp = TempDir::new().expect("tempdir");
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"").expect("write");

        let err = setup_logging("INFO", Some(&blocker.join("notifier.log"))).unwrap_err();
        assert!(matches!(err, NotifierError::Io(_)));
    }
}
