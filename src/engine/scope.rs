// src/engine/scope.rs

//! Per-invocation handle on the event sink and state store.

use serde_json::Value;
use tracing::warn;

use crate::engine::run::RunKey;
use crate::events::{Correlation, Event, EventLevel, EventSink};
use crate::state::{Record, StateKey, StateStore};

/// Everything a solver invocation (or one of its subtasks) needs to report
/// progress: where events go, where checkpoints go, and which ids to stamp
/// on them.
#[derive(Clone)]
pub struct RunScope<'a> {
    events: &'a dyn EventSink,
    state: &'a dyn StateStore,
    run_key: RunKey,
    correlation: Correlation,
}

impl<'a> RunScope<'a> {
    pub fn new(
        events: &'a dyn EventSink,
        state: &'a dyn StateStore,
        run_key: RunKey,
        correlation: Correlation,
    ) -> Self {
        Self {
            events,
            state,
            run_key,
            correlation,
        }
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    pub fn run_key(&self) -> &RunKey {
        &self.run_key
    }

    /// The same scope with events tagged for one subtask.
    pub fn for_subtask(&self, subtask_id: &str) -> Self {
        Self {
            correlation: self.correlation.for_subtask(subtask_id),
            ..self.clone()
        }
    }

    pub fn emit(&self, level: EventLevel, message: impl Into<String>) {
        self.events
            .record(Event::new(level, message, self.correlation.clone()));
    }

    pub fn emit_with(&self, level: EventLevel, message: impl Into<String>, data: Value) {
        self.events
            .record(Event::new(level, message, self.correlation.clone()).with_data(data));
    }

    /// Best-effort write of one record; failures are reported, never raised.
    pub async fn checkpoint(&self, record: Record, value: &Value) {
        let key = StateKey::new(&self.run_key, record);
        if let Err(err) = self.state.persist(&key, value).await {
            warn!(key = %key, error = %err, "failed to persist state");
            self.emit(
                EventLevel::Warning,
                format!("could not persist {}: {err}", record.file_name()),
            );
        }
    }
}
