use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::NotifierError;

/// Default OneSignal notifications endpoint.
pub const DEFAULT_ONESIGNAL_API_URL: &str = "https://onesignal.com/api/v1/notifications";

// ── Settings (CLI + environment) ───────────────────────────────────────────────

/// Push newly created signals to every registered device
#[derive(Parser, Clone)]
#[command(
    name = "signal-notifier",
    about = "Push newly created signals to every registered device",
    version
)]
pub struct Settings {
    /// PostgreSQL host
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,

    /// PostgreSQL port
    #[arg(long, env = "DB_PORT")]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// TLS negotiation with the database
    #[arg(long, env = "DB_SSLMODE", default_value = "prefer", value_parser = ["disable", "prefer", "require"])]
    pub db_sslmode: String,

    /// PEM file with extra root certificates for the database server
    #[arg(long, env = "DB_SSLROOTCERT")]
    pub db_sslrootcert: Option<PathBuf>,

    /// OneSignal application id
    #[arg(long = "onesignal-app-id", env = "ONE_SIGNAL_APP_ID")]
    pub onesignal_app_id: String,

    /// OneSignal REST API key
    #[arg(long = "onesignal-api-key", env = "ONE_SIGNAL_API_KEY", hide_env_values = true)]
    pub onesignal_api_key: String,

    /// OneSignal notifications endpoint
    #[arg(long = "onesignal-api-url", env = "ONE_SIGNAL_API_URL", default_value = DEFAULT_ONESIGNAL_API_URL)]
    pub onesignal_api_url: String,

    /// Seconds between poll cycles (1-3600)
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub poll_interval_secs: u64,

    /// Per-request timeout for push calls, in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Timeout for establishing a database connection, in seconds
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_secs: u64,

    /// Maximum number of devices notified concurrently for one signal (1-64)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub send_concurrency: u32,

    /// Logging level
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and environment, then apply the `--debug` flag.
    ///
    /// Exits the process with a usage error when a required value is absent.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list and
    /// returns the clap error instead of exiting.
    pub fn try_load_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Reject values clap accepts but the notifier cannot use, such as an
    /// empty `DB_HOST` exported by a deployment template.
    pub fn validate(&self) -> crate::error::Result<()> {
        let required = [
            ("db-host", &self.db_host),
            ("db-name", &self.db_name),
            ("db-user", &self.db_user),
            ("onesignal-app-id", &self.onesignal_app_id),
            ("onesignal-api-key", &self.onesignal_api_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(NotifierError::Config(format!("--{} must not be empty", name)));
            }
        }

        if !(self.onesignal_api_url.starts_with("https://")
            || self.onesignal_api_url.starts_with("http://"))
        {
            return Err(NotifierError::Config(format!(
                "--onesignal-api-url must be an http(s) URL, got {:?}",
                self.onesignal_api_url
            )));
        }

        Ok(())
    }

    fn resolve(mut settings: Settings) -> Settings {
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_sslmode", &self.db_sslmode)
            .field("db_sslrootcert", &self.db_sslrootcert)
            .field("onesignal_app_id", &self.onesignal_app_id)
            .field("onesignal_api_key", &"<redacted>")
            .field("onesignal_api_url", &self.onesignal_api_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("send_concurrency", &self.send_concurrency)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("debug", &self.debug)
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
