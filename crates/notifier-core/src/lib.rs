//! Core types for the signal notifier.
//!
//! Holds the data model shared by the reader and the dispatch loop, the
//! message format, the in-memory dedup set, the error taxonomy and the
//! process settings.

pub mod dispatched;
pub mod error;
pub mod message;
pub mod models;
pub mod settings;
