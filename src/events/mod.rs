// src/events/mod.rs

//! Structured run events.
//!
//! The engine reports every state transition to an injected [`EventSink`].
//! Sinks are fire-and-forget: `record` returns nothing and must not block,
//! so an unavailable sink can never stall or fail a run.
//!
//! - [`sinks`] contains the stock implementations (tracing, in-memory,
//!   discard, fan-out).

pub mod sinks;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dag::SubtaskId;

pub use sinks::{MemorySink, NullSink, TeeSink, TracingSink};

/// Event categories, matching what run viewers filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
    Task,
    Code,
    Result,
    Execution,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventLevel::Info => "info",
            EventLevel::Success => "success",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
            EventLevel::Debug => "debug",
            EventLevel::Task => "task",
            EventLevel::Code => "code",
            EventLevel::Result => "result",
            EventLevel::Execution => "execution",
        };
        f.write_str(s)
    }
}

/// Ids tying an event to its place in the recursion tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// The solver invocation that emitted the event.
    pub task_id: Uuid,
    /// The solver invocation that spawned this one, if any.
    pub parent_id: Option<Uuid>,
    /// Subtask id within the parent decomposition.
    pub subtask_id: Option<SubtaskId>,
    pub depth: u32,
}

impl Correlation {
    pub fn root(task_id: Uuid, depth: u32) -> Self {
        Self {
            task_id,
            parent_id: None,
            subtask_id: None,
            depth,
        }
    }

    /// Same invocation, scoped to one of its subtasks.
    pub fn for_subtask(&self, subtask_id: &str) -> Self {
        Self {
            subtask_id: Some(subtask_id.to_string()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub level: EventLevel,
    pub message: String,
    pub correlation: Correlation,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(level: EventLevel, message: impl Into<String>, correlation: Correlation) -> Self {
        Self {
            level,
            message: message.into(),
            correlation,
            data: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Observability hook consumed by the engine.
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}
