use std::time::Duration;
use thiserror::Error;

/// Failures while reading signals or devices from storage.
///
/// Any of these aborts the whole poll cycle before the dedup set is touched.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database connection could not be established.
    #[error("Failed to connect to storage: {0}")]
    Connect(String),

    /// The TLS client could not be set up, e.g. an unreadable root certificate.
    #[error("Failed to configure storage TLS: {0}")]
    Tls(String),

    /// Connection establishment did not finish within the configured timeout.
    #[error("Timed out connecting to storage after {0:?}")]
    ConnectTimeout(Duration),

    /// A query failed or a row could not be decoded.
    #[error("Storage query failed ({query}): {message}")]
    Query {
        query: &'static str,
        message: String,
    },
}

/// Failures of a single (message, device) delivery.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The provider answered with anything other than HTTP 200.
    #[error("Gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// The per-request timeout elapsed.
    #[error("Gateway request timed out")]
    Timeout,
}

/// Errors surfaced while starting the notifier.
///
/// Per-cycle failures never reach this type; they are logged by the cycle.
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the notifier crates.
pub type Result<T> = std::result::Result<T, NotifierError>;
