//! Event Module - audit trail of a task run
//!
//! - `Event`: envelope with id + timestamp + kind
//! - `EventKind`: task-level and step-level events
//! - `EventLog`: thread-safe, append-only log, exportable as JSON Lines

mod log;

pub use log::{Event, EventKind, EventLog};
