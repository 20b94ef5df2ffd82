// src/engine/subtask.rs

//! Solving the subtasks of one decomposition, level by level.
//!
//! Each subtask is handed to a nested solver invocation at `depth - 1`.
//! A subtask that keeps failing does not abort the parent: once its own
//! retry budget is spent, a [`FailureSentinel`] takes its place in the
//! [`ResultMap`] and dependents see that string as their input.

use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::dag::{Level, Subproblem, SubtaskId};
use crate::engine::results::{FailureSentinel, ResultMap, SubtaskOutcome};
use crate::engine::run::ParentRef;
use crate::engine::scope::RunScope;
use crate::errors::ExhaustedRetries;
use crate::events::EventLevel;
use crate::state::Record;

/// Arguments of one solver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRequest {
    pub task: String,
    pub depth: u32,
    pub max_retries: u32,
    pub parent: Option<ParentRef>,
}

impl SolveRequest {
    pub fn root(task: impl Into<String>, depth: u32, max_retries: u32) -> Self {
        Self {
            task: task.into(),
            depth,
            max_retries,
            parent: None,
        }
    }
}

/// Whatever solves a single subtask. The production implementation is the
/// [`Solver`](crate::engine::Solver) itself; tests substitute scripted fakes.
pub trait SubtaskSolver: Send + Sync {
    fn solve_subtask(&self, request: SolveRequest) -> BoxFuture<'_, Result<Value, ExhaustedRetries>>;
}

/// Knobs shared by every subtask of one decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtaskPolicy {
    /// Extra attempts per subtask after the first one fails. The nested
    /// solver invocation gets the same budget.
    pub retries: u32,
    pub backoff: Duration,
    pub max_concurrency: usize,
    /// Maximum characters of the rendered dependency inputs.
    pub preview_len: usize,
}

/// How one subtask ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtaskReport {
    pub id: SubtaskId,
    pub outcome: SubtaskOutcome,
    /// Failed attempts that were retried.
    pub retries: u32,
    /// `true` if an outcome was already recorded and nothing ran.
    pub skipped: bool,
}

pub struct SubtaskRunner<'a> {
    solver: &'a dyn SubtaskSolver,
    results: &'a ResultMap,
    scope: &'a RunScope<'a>,
    depth: u32,
    policy: SubtaskPolicy,
}

impl<'a> SubtaskRunner<'a> {
    /// `depth` is the depth of the decomposing invocation; subtasks are
    /// solved one level shallower.
    pub fn new(
        solver: &'a dyn SubtaskSolver,
        results: &'a ResultMap,
        scope: &'a RunScope<'a>,
        depth: u32,
        policy: SubtaskPolicy,
    ) -> Self {
        Self {
            solver,
            results,
            scope,
            depth,
            policy,
        }
    }

    /// Run every subtask of `level`, at most `max_concurrency` at a time.
    ///
    /// Reports come back in the level's order regardless of completion order.
    pub async fn run_level(&self, level: &Level) -> Vec<SubtaskReport> {
        let permits = Semaphore::new(self.policy.max_concurrency.max(1));
        let permits = &permits;

        let tasks = level.iter().map(move |subproblem| async move {
            // The semaphore is never closed.
            let _permit = permits.acquire().await.ok();
            self.run(subproblem).await
        });

        join_all(tasks).await
    }

    /// Solve one subtask, retrying up to the policy budget, and record the
    /// outcome.
    pub async fn run(&self, subproblem: &Subproblem) -> SubtaskReport {
        let id = subproblem.id.clone();
        if let Some(existing) = self.results.get(&id) {
            debug!(subtask = %id, "outcome already recorded; skipping");
            return SubtaskReport {
                id,
                outcome: existing,
                retries: 0,
                skipped: true,
            };
        }

        let scope = self.scope.for_subtask(&id);
        let prompt = subtask_prompt(subproblem, self.results, self.policy.preview_len);
        scope.emit(EventLevel::Task, format!("Task {id}: {prompt}"));

        let budget = self.policy.retries;
        let mut retries = 0;
        let outcome = loop {
            let request = SolveRequest {
                task: prompt.clone(),
                depth: self.depth.saturating_sub(1).max(1),
                max_retries: budget,
                parent: Some(ParentRef {
                    task_id: scope.correlation().task_id,
                    subtask_id: id.clone(),
                }),
            };

            match self.solver.solve_subtask(request).await {
                Ok(value) => {
                    scope.emit_with(
                        EventLevel::Success,
                        format!("Task {id} completed"),
                        json!({ "retries": retries }),
                    );
                    break SubtaskOutcome::success(value);
                }
                Err(err) if retries < budget => {
                    retries += 1;
                    warn!(subtask = %id, attempt = retries, budget, error = %err, "subtask failed; retrying");
                    scope.emit(EventLevel::Warning, format!("Error in subtask {id}: {err}"));
                    scope.emit(
                        EventLevel::Info,
                        format!("Retrying subtask {id} ({retries}/{budget})"),
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(err) => {
                    let sentinel = FailureSentinel::new(budget, err.message);
                    warn!(subtask = %id, budget, "subtask exhausted its retries");
                    scope.emit(EventLevel::Error, format!("Task {id}: {sentinel}"));
                    break SubtaskOutcome::failed(sentinel);
                }
            }
        };

        self.results.insert(id.clone(), outcome.clone());
        scope.checkpoint(Record::Results, &self.results.to_record()).await;
        info!(subtask = %id, success = outcome.is_success(), retries, "subtask finished");

        SubtaskReport {
            id,
            outcome,
            retries,
            skipped: false,
        }
    }
}

/// Task text handed to the nested invocation: the description on one line,
/// plus a bounded summary of the dependency values when there are any.
pub fn subtask_prompt(subproblem: &Subproblem, results: &ResultMap, preview_len: usize) -> String {
    let description = subproblem.description.replace(['\r', '\n'], " ");
    match render_inputs(&subproblem.dependencies, results, preview_len) {
        Some(inputs) => format!("{description} with inputs {inputs}"),
        None => description,
    }
}

/// Compact JSON list of the recorded dependency values, in dependency order,
/// cut to `max_len` characters (ending in `...` when cut).
///
/// Returns `None` when `dependencies` is empty.
pub fn render_inputs(dependencies: &[SubtaskId], results: &ResultMap, max_len: usize) -> Option<String> {
    if dependencies.is_empty() {
        return None;
    }

    let values: Vec<Value> = dependencies
        .iter()
        .filter_map(|dep| results.value_of(dep))
        .collect();
    let rendered = Value::Array(values).to_string();

    if rendered.chars().count() <= max_len {
        return Some(rendered);
    }
    let keep = max_len.saturating_sub(3);
    let head: String = rendered.chars().take(keep).collect();
    Some(format!("{head}..."))
}
