// src/engine/results.rs

//! The per-decomposition result map.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dag::SubtaskId;

/// Stand-in value for a subtask whose retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSentinel {
    pub retries: u32,
    pub error: String,
}

impl FailureSentinel {
    pub fn new(retries: u32, error: impl Into<String>) -> Self {
        Self {
            retries,
            error: error.into(),
        }
    }
}

impl fmt::Display for FailureSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed after {} retries: {}", self.retries, self.error)
    }
}

/// What a subtask left in the result map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubtaskOutcome {
    Success { value: Value },
    Failed { sentinel: FailureSentinel },
}

impl SubtaskOutcome {
    pub fn success(value: Value) -> Self {
        SubtaskOutcome::Success { value }
    }

    pub fn failed(sentinel: FailureSentinel) -> Self {
        SubtaskOutcome::Failed { sentinel }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubtaskOutcome::Success { .. })
    }

    /// The value dependents and the aggregator see: the success value, or the
    /// sentinel rendered as a string.
    pub fn to_value(&self) -> Value {
        match self {
            SubtaskOutcome::Success { value } => value.clone(),
            SubtaskOutcome::Failed { sentinel } => Value::String(sentinel.to_string()),
        }
    }
}

/// Mapping from subtask id to outcome, shared by the subtasks of one level.
///
/// Each key is written once by the subtask that owns it; a second write for
/// the same id is ignored. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct ResultMap {
    inner: Arc<Mutex<BTreeMap<SubtaskId, SubtaskOutcome>>>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. Returns `false` if the id already had one.
    pub fn insert(&self, id: impl Into<SubtaskId>, outcome: SubtaskOutcome) -> bool {
        let id = id.into();
        let mut map = self.lock();
        if map.contains_key(&id) {
            warn!(subtask = %id, "result already recorded; keeping the first one");
            return false;
        }
        map.insert(id, outcome);
        true
    }

    pub fn get(&self, id: &str) -> Option<SubtaskOutcome> {
        self.lock().get(id).cloned()
    }

    /// Convenience for [`SubtaskOutcome::to_value`] on one entry.
    pub fn value_of(&self, id: &str) -> Option<Value> {
        self.lock().get(id).map(SubtaskOutcome::to_value)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<SubtaskId, SubtaskOutcome> {
        self.lock().clone()
    }

    /// Persisted form: `{ id: {"status": "success", "value": ...} | {"status": "failed", "sentinel": ...} }`.
    pub fn to_record(&self) -> Value {
        serde_json::to_value(&*self.lock()).unwrap_or(Value::Null)
    }

    /// Rebuild a map from a persisted record (crash recovery).
    pub fn from_record(record: &Value) -> Result<Self, serde_json::Error> {
        let map: BTreeMap<SubtaskId, SubtaskOutcome> = serde_json::from_value(record.clone())?;
        Ok(Self {
            inner: Arc::new(Mutex::new(map)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubtaskId, SubtaskOutcome>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
