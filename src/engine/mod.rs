// src/engine/mod.rs

//! Solving engine for solvedag.
//!
//! This module ties together:
//! - the per-invocation run record ([`run`])
//! - the shared result map and failure sentinels ([`results`])
//! - the level-by-level subtask runner with per-subtask retries ([`subtask`])
//! - final-value selection ([`aggregate`])
//! - the recursive solver and its top-level retry loop ([`solver`])
//!
//! Event emission and best-effort checkpointing for one invocation go
//! through [`scope::RunScope`].

pub mod aggregate;
pub mod results;
pub mod run;
pub mod scope;
pub mod solver;
pub mod subtask;

pub use aggregate::{Aggregated, ResultAggregator};
pub use results::{FailureSentinel, ResultMap, SubtaskOutcome};
pub use run::{ParentRef, RunKey, TaskRun};
pub use scope::RunScope;
pub use solver::{Plan, Solver, SolverContext, SolverOptions};
pub use subtask::{
    render_inputs, subtask_prompt, SolveRequest, SubtaskPolicy, SubtaskReport, SubtaskRunner,
    SubtaskSolver,
};
