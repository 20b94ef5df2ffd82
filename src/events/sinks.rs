// src/events/sinks.rs

//! Stock [`EventSink`] implementations.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Event, EventLevel, EventSink};

/// Forwards events into `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        let c = &event.correlation;
        let subtask = c.subtask_id.as_deref().unwrap_or("-");
        match event.level {
            EventLevel::Error => error!(
                task_id = %c.task_id,
                subtask,
                depth = c.depth,
                "{}",
                event.message
            ),
            EventLevel::Warning => warn!(
                task_id = %c.task_id,
                subtask,
                depth = c.depth,
                "{}",
                event.message
            ),
            EventLevel::Debug | EventLevel::Code => debug!(
                task_id = %c.task_id,
                subtask,
                depth = c.depth,
                kind = %event.level,
                data = %event.data,
                "{}",
                event.message
            ),
            _ => info!(
                task_id = %c.task_id,
                subtask,
                depth = c.depth,
                kind = %event.level,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Events emitted by one solver invocation.
    pub fn events_for(&self, task_id: Uuid) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.correlation.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn events_at(&self, level: EventLevel) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.lock().push(event);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}

/// Fans each event out to several sinks.
#[derive(Clone, Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for TeeSink {
    fn record(&self, event: Event) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}
