use std::fmt;

use serde::{Deserialize, Serialize};

/// The two states of one solver invocation, chosen purely by depth.
///
/// - `Direct`: synthesize one program, execute it, fix-and-rerun on failure.
/// - `Decomposed`: split the task into subtasks, schedule them level by
///   level and recurse into the solver for each one at `depth - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMode {
    Direct,
    Decomposed,
}

impl SolveMode {
    pub fn for_depth(depth: u32) -> Self {
        if depth <= 1 {
            SolveMode::Direct
        } else {
            SolveMode::Decomposed
        }
    }
}

impl fmt::Display for SolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveMode::Direct => f.write_str("direct"),
            SolveMode::Decomposed => f.write_str("decomposed"),
        }
    }
}

/// Lifecycle of a [`TaskRun`](crate::engine::TaskRun).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}
