// src/state/mod.rs

//! Durable, best-effort checkpoints of a run.
//!
//! Per solver invocation (identified by a [`RunKey`]) the engine writes:
//! - `run.json`: the [`TaskRun`](crate::engine::TaskRun) record
//! - `main.py`: the current program (direct path)
//! - `decomposition.json`: subproblems, levels and aggregation spec
//! - `results.json`: the result map, rewritten after every subtask
//! - `final_result.json`: the aggregated value
//!
//! The engine never depends on a write succeeding; failures are logged and
//! the run carries on.

pub mod fs_store;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::RunKey;
use crate::errors::StateError;

pub use fs_store::FsStateStore;

/// Kind of record stored for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Record {
    Run,
    Program,
    Decomposition,
    Results,
    FinalResult,
}

impl Record {
    pub fn file_name(self) -> &'static str {
        match self {
            Record::Run => "run.json",
            Record::Program => "main.py",
            Record::Decomposition => "decomposition.json",
            Record::Results => "results.json",
            Record::FinalResult => "final_result.json",
        }
    }

    /// Records stored as raw text rather than JSON.
    pub fn is_text(self) -> bool {
        matches!(self, Record::Program)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub run: RunKey,
    pub record: Record,
}

impl StateKey {
    pub fn new(run: &RunKey, record: Record) -> Self {
        Self {
            run: run.clone(),
            record,
        }
    }

    /// Location relative to the store root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.run.as_str()).join(self.record.file_name())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path().display())
    }
}

/// Durable key/value checkpoint store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Overwrite the record at `key`.
    async fn persist(&self, key: &StateKey, value: &Value) -> Result<(), StateError>;

    /// Read back a record; `Ok(None)` if it was never written.
    async fn load(&self, key: &StateKey) -> Result<Option<Value>, StateError>;
}
