//! In-memory record of signals that have already been announced.
//!
//! The set lives for the lifetime of the process only: it starts empty, grows
//! by one id per newly dispatched signal and is never pruned or written to
//! disk. After a restart every signal still present in storage is new again.

use std::collections::HashSet;

use crate::models::SignalId;

/// Ids of signals that have been fanned out during this process lifetime.
///
/// # Example
///
/// ```
/// use notifier_core::dispatched::DispatchedSet;
/// use notifier_core::models::SignalId;
///
/// let mut set = DispatchedSet::new();
/// let id = SignalId::new("17");
/// assert!(!set.contains(&id));
/// assert!(set.mark_dispatched(id.clone()));
/// assert!(set.contains(&id));
/// ```
#[derive(Debug, Default, Clone)]
pub struct DispatchedSet {
    ids: HashSet<SignalId>,
}

impl DispatchedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when `id` has already been dispatched.
    pub fn contains(&self, id: &SignalId) -> bool {
        self.ids.contains(id)
    }

    /// Record `id` as dispatched.
    ///
    /// Returns `false` when it was already present.
    pub fn mark_dispatched(&mut self, id: SignalId) -> bool {
        self.ids.insert(id)
    }

    /// Number of distinct signals dispatched so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
