//! Signal and device reads from PostgreSQL.
//!
//! Every call opens its own connection, runs a single query and drops the
//! client again. There is no pooling: one cycle issues two short-lived
//! connections. TLS is negotiated according to [`StorageConfig::ssl_mode`],
//! with server certificates checked against the webpki roots plus an optional
//! PEM bundle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notifier_core::error::StorageError;
use notifier_core::models::{Device, SignalId, SignalRecord};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::{Client, Row};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

pub use tokio_postgres::config::SslMode;

// ── Queries ───────────────────────────────────────────────────────────────────

/// Signals that carry a recommendation, most recent first.
pub const PENDING_SIGNALS_QUERY: &str = "\
SELECT id::text, home_team, away_team, refer_team, signal, league \
FROM signal_main \
WHERE signal IS NOT NULL \
ORDER BY date_time DESC";

/// Every registered push target.
pub const DEVICES_QUERY: &str = "\
SELECT player_id::text \
FROM onesignal_users \
WHERE player_id IS NOT NULL";

// ── SignalSource ──────────────────────────────────────────────────────────────

/// Read side of the notifier.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// All rows with a non-null signal, ordered most recent first.
    async fn fetch_pending_signals(&self) -> Result<Vec<SignalRecord>, StorageError>;

    /// All known device ids. An empty list is valid.
    async fn fetch_devices(&self) -> Result<Vec<Device>, StorageError>;
}

#[async_trait]
impl<T: SignalSource + ?Sized> SignalSource for Arc<T> {
    async fn fetch_pending_signals(&self) -> Result<Vec<SignalRecord>, StorageError> {
        (**self).fetch_pending_signals().await
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>, StorageError> {
        (**self).fetch_devices().await
    }
}

// ── StorageConfig ─────────────────────────────────────────────────────────────

/// Connection parameters for the signal database.
#[derive(Clone)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Upper bound on connection establishment.
    pub connect_timeout: Duration,
    pub ssl_mode: SslMode,
    /// Extra PEM certificates trusted for the server, e.g. a managed
    /// provider's private CA.
    pub ssl_root_cert: Option<PathBuf>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("ssl_mode", &self.ssl_mode)
            .field("ssl_root_cert", &self.ssl_root_cert)
            .finish()
    }
}

impl StorageConfig {
    // `connect_timeout` is enforced around the whole connect future, TLS
    // handshake included, rather than through the driver config.
    fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .ssl_mode(self.ssl_mode)
            .application_name("signal-notifier");
        config
    }
}

/// Parse a libpq-style `sslmode` name. Only the modes the driver supports
/// are accepted.
pub fn parse_ssl_mode(value: &str) -> Option<SslMode> {
    match value.to_ascii_lowercase().as_str() {
        "disable" => Some(SslMode::Disable),
        "prefer" => Some(SslMode::Prefer),
        "require" => Some(SslMode::Require),
        _ => None,
    }
}

/// Build the rustls connector used for every connection.
fn tls_connector(root_cert: Option<&Path>) -> Result<MakeRustlsConnect, StorageError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = root_cert {
        let certs = CertificateDer::pem_file_iter(path)
            .map_err(|e| StorageError::Tls(format!("{}: {:?}", path.display(), e)))?;
        for cert in certs {
            let cert =
                cert.map_err(|e| StorageError::Tls(format!("{}: {:?}", path.display(), e)))?;
            roots
                .add(cert)
                .map_err(|e| StorageError::Tls(format!("{}: {}", path.display(), e)))?;
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| StorageError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

// ── PostgresSignalSource ──────────────────────────────────────────────────────

/// [`SignalSource`] backed by a PostgreSQL database.
pub struct PostgresSignalSource {
    config: StorageConfig,
    tls: MakeRustlsConnect,
}

impl PostgresSignalSource {
    /// Fails only when the extra root certificates cannot be loaded.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let tls = tls_connector(config.ssl_root_cert.as_deref())?;
        Ok(Self { config, tls })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Open a fresh connection and spawn its driver task.
    ///
    /// The connection closes once the returned client is dropped.
    async fn connect(&self) -> Result<Client, StorageError> {
        let pg_config = self.config.to_pg_config();
        let timeout = self.config.connect_timeout;

        let connecting = pg_config.connect(self.tls.clone());
        let (client, connection) = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| StorageError::ConnectTimeout(timeout))?
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "storage connection closed with error");
            }
        });

        debug!(host = %self.config.host, db = %self.config.dbname, "storage connection opened");
        Ok(client)
    }

    async fn query(&self, label: &'static str, sql: &str) -> Result<Vec<Row>, StorageError> {
        let client = self.connect().await?;
        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| StorageError::Query {
                query: label,
                message: e.to_string(),
            })?;
        drop(client);
        Ok(rows)
    }
}

#[async_trait]
impl SignalSource for PostgresSignalSource {
    async fn fetch_pending_signals(&self) -> Result<Vec<SignalRecord>, StorageError> {
        let rows = self.query("signals", PENDING_SIGNALS_QUERY).await?;
        let records = rows
            .iter()
            .map(signal_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = records.len(), "pending signals fetched");
        Ok(records)
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>, StorageError> {
        let rows = self.query("devices", DEVICES_QUERY).await?;
        let devices = rows
            .iter()
            .map(|row| text_column(row, "devices", 0).map(|id| Device::new(id.unwrap_or_default())))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = devices.len(), "devices fetched");
        Ok(devices)
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

fn signal_from_row(row: &Row) -> Result<SignalRecord, StorageError> {
    let mut columns: [Option<String>; 6] = Default::default();
    for (idx, slot) in columns.iter_mut().enumerate() {
        *slot = text_column(row, "signals", idx)?;
    }
    Ok(signal_from_columns(columns))
}

/// Build a record from the six selected columns, in query order.
///
/// A NULL column becomes an empty string, so a NULL league renders as an
/// empty third line instead of the literal text `None`. Two NULL teams
/// compare equal, which makes a NULL `refer_team` with a NULL `home_team`
/// pick the away side as opponent.
pub fn signal_from_columns(columns: [Option<String>; 6]) -> SignalRecord {
    let [id, home_team, away_team, refer_team, signal, league] =
        columns.map(Option::unwrap_or_default);

    SignalRecord {
        id: SignalId::new(id),
        home_team,
        away_team,
        refer_team,
        signal,
        league,
    }
}

fn text_column(row: &Row, label: &'static str, idx: usize) -> Result<Option<String>, StorageError> {
    row.try_get::<_, Option<String>>(idx)
        .map_err(|e| StorageError::Query {
            query: label,
            message: format!("column {}: {}", idx, e),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
