//! Human-readable push text for a [`SignalRecord`].

use crate::models::SignalRecord;

/// Heading shown above every push notification.
pub const NOTIFICATION_HEADING: &str = "NEW SIGNAL";

/// Return the participant the referenced team is playing against.
///
/// When `refer_team` equals neither side the home team is returned.
///
/// # Examples
///
/// ```
/// use notifier_core::message::opponent;
///
/// assert_eq!(opponent("A", "B", "A"), "B");
/// assert_eq!(opponent("A", "B", "B"), "A");
/// assert_eq!(opponent("A", "B", "C"), "A");
/// ```
pub fn opponent<'a>(home_team: &'a str, away_team: &'a str, refer_team: &str) -> &'a str {
    if refer_team == home_team {
        away_team
    } else {
        home_team
    }
}

/// Build the three-line notification body for `record`.
///
/// # Examples
///
/// ```
/// use notifier_core::message::compose_message;
/// use notifier_core::models::{SignalId, SignalRecord};
///
/// let record = SignalRecord {
///     id: SignalId::new("1"),
///     home_team: "A".into(),
///     away_team: "B".into(),
///     refer_team: "A".into(),
///     signal: "BUY".into(),
///     league: "X".into(),
/// };
/// assert_eq!(compose_message(&record), "A BUY\nvs B\nX");
/// ```
pub fn compose_message(record: &SignalRecord) -> String {
    let opponent = opponent(&record.home_team, &record.away_team, &record.refer_team);
    format!(
        "{} {}\nvs {}\n{}",
        record.refer_team, record.signal, opponent, record.league
    )
}
