//! Event log for task execution
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: task level and step level variants
//! - EventLog: thread-safe, append-only log

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types
///
/// Uses Arc<str> for task/step names to keep cloning cheap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // TASK LEVEL
    // ═══════════════════════════════════════════
    TaskStarted {
        task: Arc<str>,
        step_count: usize,
    },
    TaskCompleted {
        task: Arc<str>,
        success: bool,
        duration_ms: u64,
    },
    TaskCancelled {
        task: Arc<str>,
        /// Step that was running when cancellation arrived
        step: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStarted {
        task: Arc<str>,
        step: Arc<str>,
        program: String,
        args: Vec<String>,
    },
    StepCompleted {
        task: Arc<str>,
        step: Arc<str>,
        exit_code: Option<i32>,
        duration_ms: u64,
    },
    StepFailed {
        task: Arc<str>,
        step: Arc<str>,
        error: String,
        abort: bool,
    },
    ValueExtracted {
        task: Arc<str>,
        step: Arc<str>,
        query: String,
        value: Value,
    },
}

impl EventKind {
    /// Task name every event belongs to
    pub fn task(&self) -> &str {
        match self {
            Self::TaskStarted { task, .. }
            | Self::TaskCompleted { task, .. }
            | Self::TaskCancelled { task, .. }
            | Self::StepStarted { task, .. }
            | Self::StepCompleted { task, .. }
            | Self::StepFailed { task, .. }
            | Self::ValueExtracted { task, .. } => task,
        }
    }

    /// Step id if the event is step-related
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepStarted { step, .. }
            | Self::StepCompleted { step, .. }
            | Self::StepFailed { step, .. }
            | Self::ValueExtracted { step, .. } => Some(step),
            Self::TaskCancelled { step, .. } => step.as_deref(),
            Self::TaskStarted { .. } | Self::TaskCompleted { .. } => None,
        }
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events for one step of one task
    pub fn filter_step(&self, task: &str, step: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.task() == task && e.kind.step() == Some(step))
                .cloned()
                .collect()
        })
    }

    /// Write every event as one JSON object per line
    pub fn write_jsonl(&self, mut writer: impl Write) -> Result<()> {
        self.with_events(|events| -> Result<()> {
            for event in events {
                serde_json::to_writer(&mut writer, event)?;
                writer.write_all(b"\n")?;
            }
            Ok(())
        })
    }

    /// Write the log to `path` as JSON Lines (truncates existing file)
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_jsonl(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}
