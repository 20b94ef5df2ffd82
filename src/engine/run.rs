// src/engine/run.rs

//! Per-invocation run records.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::dag::SubtaskId;
use crate::errors::ExhaustedRetries;
use crate::events::Correlation;
use crate::types::{SolveMode, TaskStatus};

const SLUG_MAX_CHARS: usize = 50;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s-]+").expect("valid slug regex"));

/// Directory-safe identifier of one solver invocation:
/// `{YYYYmmdd_HHMMSS}_task_{slug}_{8 hex chars}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunKey(String);

impl RunKey {
    pub fn for_task(task: &str, at: DateTime<Local>, id: Uuid) -> Self {
        let short = id.simple().to_string();
        Self(format!(
            "{}_task_{}_{}",
            at.format("%Y%m%d_%H%M%S"),
            slugify(task),
            &short[..8]
        ))
    }

    /// Wrap an existing key (e.g. a directory name read back from disk).
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case, strip punctuation, collapse whitespace/hyphens to `_`.
pub fn slugify(task: &str) -> String {
    let lowered = task.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "_");
    let slug: String = joined.chars().take(SLUG_MAX_CHARS).collect();
    if slug.is_empty() {
        "unknown_task".to_string()
    } else {
        slug
    }
}

/// Link from a nested invocation back to the decomposition that spawned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub task_id: Uuid,
    pub subtask_id: SubtaskId,
}

/// Top-level record of one solver invocation.
///
/// Mutated only on state transitions: `start`, `record_failure`,
/// `complete`, `fail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: Uuid,
    pub parent: Option<ParentRef>,
    pub run_key: RunKey,
    pub task: String,
    pub depth: u32,
    pub mode: SolveMode,
    pub max_retries: u32,
    pub retries: u32,
    pub last_error: Option<String>,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRun {
    pub fn new(task: impl Into<String>, depth: u32, max_retries: u32, parent: Option<ParentRef>) -> Self {
        let task = task.into();
        let id = Uuid::new_v4();
        Self {
            id,
            parent,
            run_key: RunKey::for_task(&task, Local::now(), id),
            task,
            depth,
            mode: SolveMode::for_depth(depth),
            max_retries,
            retries: 0,
            last_error: None,
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn correlation(&self) -> Correlation {
        Correlation {
            task_id: self.id,
            parent_id: self.parent.as_ref().map(|p| p.task_id),
            subtask_id: self.parent.as_ref().map(|p| p.subtask_id.clone()),
            depth: self.depth,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        debug!(task_id = %self.id, depth = self.depth, mode = %self.mode, "task run started");
    }

    /// Count a failed attempt. Returns `true` while retries remain.
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        self.retries += 1;
        self.last_error = Some(error.into());
        self.retries <= self.max_retries
    }

    /// Attempt number about to run (0 for the first attempt).
    pub fn attempt(&self) -> u32 {
        self.retries
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Terminal failure; returns the error surfaced to the caller.
    pub fn fail(&mut self) -> ExhaustedRetries {
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
        ExhaustedRetries {
            retries: self.max_retries,
            message: self
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}
