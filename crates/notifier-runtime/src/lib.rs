//! Runtime layer for the signal notifier.
//!
//! Owns the push gateway, the per-cycle dispatch loop with its dedup set, and
//! the interval orchestrator that drives cycles without overlap.

pub mod dispatcher;
pub mod gateway;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use notifier_core as core;
pub use notifier_data as data;
