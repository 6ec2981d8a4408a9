//! Storage layer for the signal notifier.
//!
//! Reads pending signals and registered devices from PostgreSQL behind the
//! [`reader::SignalSource`] trait so the dispatch loop can be exercised
//! without a database.

pub mod reader;

pub use notifier_core as core;
