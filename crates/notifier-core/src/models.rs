use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a `signal_main` row.
///
/// Held in its textual form so the notifier does not care whether storage
/// keys rows by integer, bigint or uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<i64> for SignalId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// A single recommendation row read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Row identifier, the dedup key.
    pub id: SignalId,
    /// Home participant name.
    pub home_team: String,
    /// Away participant name.
    pub away_team: String,
    /// Participant whose perspective the signal is written from.
    pub refer_team: String,
    /// Signal text, e.g. `"BUY"`.
    pub signal: String,
    /// League or category label.
    pub league: String,
}

/// A registered push target (OneSignal player id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(String);

impl Device {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self(player_id.into())
    }

    pub fn player_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Device {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
