// src/engine/solver.rs

//! The recursive solver.
//!
//! One [`Solver::solve`] call is one invocation: a [`TaskRun`] is created,
//! then attempts are made until one succeeds or the retry budget runs out.
//!
//! - depth 1: generate a program, execute it; on failure ask the
//!   synthesizer to fix the last program and try again.
//! - depth > 1: decompose into `depth` subtasks, build and level the graph,
//!   solve each subtask through a nested invocation at `depth - 1`, then
//!   aggregate. Every attempt decomposes from scratch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::dag::{Decomposition, GraphBuilder, Level, LevelPlanner};
use crate::engine::aggregate::{Aggregated, ResultAggregator};
use crate::engine::results::ResultMap;
use crate::engine::run::TaskRun;
use crate::engine::scope::RunScope;
use crate::engine::subtask::{SolveRequest, SubtaskPolicy, SubtaskRunner, SubtaskSolver};
use crate::errors::{AttemptError, ExhaustedRetries};
use crate::events::{EventLevel, EventSink};
use crate::exec::Executor;
use crate::state::{Record, StateStore};
use crate::synth::{CodeSynthesizer, Decomposer};
use crate::types::SolveMode;

const RESULT_PREVIEW_CHARS: usize = 50;

/// Tunables that are not part of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    /// Pause between a failed attempt and the next one.
    pub retry_backoff: Duration,
    /// Per-subtask retry budget; `None` reuses the invocation's budget.
    pub subtask_retries: Option<u32>,
    pub max_concurrency: usize,
    pub input_preview_len: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(1000),
            subtask_retries: None,
            max_concurrency: 4,
            input_preview_len: 100,
        }
    }
}

/// The injected collaborators.
#[derive(Clone)]
pub struct SolverContext {
    pub decomposer: Arc<dyn Decomposer>,
    pub synthesizer: Arc<dyn CodeSynthesizer>,
    pub executor: Arc<dyn Executor>,
    pub events: Arc<dyn EventSink>,
    pub state: Arc<dyn StateStore>,
}

/// A validated decomposition together with its execution levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub decomposition: Decomposition,
    pub levels: Vec<Level>,
}

impl Plan {
    pub fn to_record(&self) -> Value {
        json!({
            "subproblems": self.decomposition.subproblems,
            "levels": self.levels,
            "aggregation": self.decomposition.aggregation,
            "strategy": self.decomposition.strategy,
            "repairs": self
                .decomposition
                .repairs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        })
    }
}

/// Program state carried across direct-mode attempts.
#[derive(Debug, Default)]
struct DirectState {
    program: Option<String>,
    execution_error: Option<String>,
}

pub struct Solver {
    ctx: SolverContext,
    options: SolverOptions,
}

impl Solver {
    pub fn new(ctx: SolverContext, options: SolverOptions) -> Self {
        Self { ctx, options }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Solve `task` at `depth`, allowing `max_retries` retries after the
    /// first attempt.
    pub async fn solve(&self, task: &str, depth: u32, max_retries: u32) -> Result<Value, ExhaustedRetries> {
        self.solve_request(SolveRequest::root(task, depth, max_retries))
            .await
    }

    /// Boxed so decomposed invocations can recurse through
    /// [`SubtaskSolver`].
    pub fn solve_request(&self, request: SolveRequest) -> BoxFuture<'_, Result<Value, ExhaustedRetries>> {
        async move {
            let SolveRequest {
                task,
                depth,
                max_retries,
                parent,
            } = request;

            let mut run = TaskRun::new(task, depth, max_retries, parent);
            let scope = RunScope::new(
                self.ctx.events.as_ref(),
                self.ctx.state.as_ref(),
                run.run_key.clone(),
                run.correlation(),
            );
            let started = Instant::now();

            run.start();
            info!(task_id = %run.id, depth, mode = %run.mode, max_retries, "solving task");
            scope.emit_with(
                EventLevel::Task,
                format!("Solving task '{}' at depth {depth}", run.task),
                json!({ "mode": run.mode, "max_retries": max_retries, "run_key": run.run_key }),
            );
            self.checkpoint_run(&scope, &run).await;

            let mut direct = DirectState::default();
            loop {
                if run.attempt() > 0 {
                    scope.emit(
                        EventLevel::Info,
                        format!("Retry attempt {}/{}", run.attempt(), run.max_retries),
                    );
                }

                let attempt = match run.mode {
                    SolveMode::Direct => self.direct_attempt(&run, &scope, &mut direct).await,
                    SolveMode::Decomposed => self.decomposed_attempt(&run, &scope).await,
                };

                match attempt {
                    Ok(value) => {
                        run.complete();
                        let elapsed = started.elapsed();
                        info!(task_id = %run.id, retries = run.retries, ?elapsed, "task solved");
                        scope.emit(
                            EventLevel::Success,
                            format!("Task completed in {:.2} seconds", elapsed.as_secs_f64()),
                        );
                        scope.emit_with(EventLevel::Result, "Final result", json!({ "result": value }));
                        self.checkpoint_run(&scope, &run).await;
                        return Ok(value);
                    }
                    Err(err) => {
                        let message = err.to_string();
                        warn!(task_id = %run.id, attempt = run.attempt(), error = %message, "attempt failed");
                        scope.emit(EventLevel::Error, format!("Error in execution: {message}"));

                        if run.record_failure(message) {
                            self.checkpoint_run(&scope, &run).await;
                            tokio::time::sleep(self.options.retry_backoff).await;
                            continue;
                        }

                        let exhausted = run.fail();
                        scope.emit(EventLevel::Error, exhausted.to_string());
                        self.checkpoint_run(&scope, &run).await;
                        return Err(exhausted);
                    }
                }
            }
        }
        .boxed()
    }

    /// Decompose `task` once and level the result, without executing
    /// anything.
    pub async fn plan(&self, task: &str, depth: u32) -> Result<Plan, AttemptError> {
        let raw = self.ctx.decomposer.decompose(task, depth as usize).await?;
        debug!(count = raw.len(), "decomposer replied");
        let decomposition = GraphBuilder::build(raw)?;
        let levels = LevelPlanner::plan_decomposition(&decomposition);
        Ok(Plan {
            decomposition,
            levels,
        })
    }

    /// Run every level of `plan` against `results` and aggregate.
    ///
    /// Subtasks already present in `results` are not run again.
    pub async fn execute_plan(
        &self,
        run: &TaskRun,
        scope: &RunScope<'_>,
        plan: &Plan,
        results: &ResultMap,
    ) -> Aggregated {
        let policy = SubtaskPolicy {
            retries: self.options.subtask_retries.unwrap_or(run.max_retries),
            backoff: self.options.retry_backoff,
            max_concurrency: self.options.max_concurrency,
            preview_len: self.options.input_preview_len,
        };
        let runner = SubtaskRunner::new(self, results, scope, run.depth, policy);

        for (index, level) in plan.levels.iter().enumerate() {
            let started = Instant::now();
            scope.emit(
                EventLevel::Info,
                format!("Processing level {index} with {} tasks", level.len()),
            );
            let reports = runner.run_level(level).await;
            let failed = reports.iter().filter(|r| !r.outcome.is_success()).count();
            debug!(level = index, tasks = reports.len(), failed, "level joined");
            scope.emit(
                EventLevel::Info,
                format!(
                    "Level {index} completed in {:.2} seconds",
                    started.elapsed().as_secs_f64()
                ),
            );
        }

        let aggregated =
            ResultAggregator::aggregate(&plan.decomposition.aggregation, &plan.levels, results);
        if let Some(reason) = &aggregated.fallback {
            scope.emit(EventLevel::Warning, format!("Aggregation fell back: {reason}"));
        }
        aggregated
    }

    async fn direct_attempt(
        &self,
        run: &TaskRun,
        scope: &RunScope<'_>,
        state: &mut DirectState,
    ) -> Result<Value, AttemptError> {
        let program = match (state.program.as_deref(), state.execution_error.as_deref()) {
            (Some(previous), Some(error)) => {
                scope.emit(EventLevel::Info, "Editing existing program");
                self.ctx.synthesizer.fix(previous, error).await?
            }
            (Some(previous), None) => previous.to_string(),
            (None, _) => self.ctx.synthesizer.generate(&run.task).await?,
        };

        scope.emit_with(EventLevel::Code, "Generated code", json!({ "code": program }));
        scope
            .checkpoint(Record::Program, &Value::String(program.clone()))
            .await;
        state.program = Some(program.clone());

        scope.emit(EventLevel::Execution, "Executing program");
        match self.ctx.executor.run(&program).await {
            Ok(value) => {
                state.execution_error = None;
                scope.emit_with(
                    EventLevel::Execution,
                    "Execution succeeded",
                    json!({ "result": value }),
                );
                Ok(value)
            }
            Err(err) => {
                state.execution_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    async fn decomposed_attempt(&self, run: &TaskRun, scope: &RunScope<'_>) -> Result<Value, AttemptError> {
        scope.emit(
            EventLevel::Info,
            format!("Decomposing task into {} subproblems", run.depth),
        );
        let plan = self.plan(&run.task, run.depth).await?;

        for repair in &plan.decomposition.repairs {
            scope.emit(EventLevel::Warning, repair.to_string());
        }
        scope.emit_with(
            EventLevel::Code,
            "Decomposition results",
            json!({
                "subtasks": plan.decomposition.subproblems,
                "levels": plan.levels.len(),
                "aggregation": plan.decomposition.aggregation,
            }),
        );
        scope.checkpoint(Record::Decomposition, &plan.to_record()).await;

        let results = ResultMap::new();
        let aggregated = self.execute_plan(run, scope, &plan, &results).await;

        scope.emit_with(
            EventLevel::Info,
            "Results by task id",
            Value::Object(
                results
                    .snapshot()
                    .into_iter()
                    .map(|(id, outcome)| (id, Value::String(preview(&outcome.to_value()))))
                    .collect(),
            ),
        );
        scope
            .checkpoint(
                Record::FinalResult,
                &json!({ "result": aggregated.value, "source": aggregated.source }),
            )
            .await;

        Ok(aggregated.value)
    }

    async fn checkpoint_run(&self, scope: &RunScope<'_>, run: &TaskRun) {
        match serde_json::to_value(run) {
            Ok(value) => scope.checkpoint(Record::Run, &value).await,
            Err(err) => warn!(error = %err, "could not serialize task run"),
        }
    }
}

impl SubtaskSolver for Solver {
    fn solve_subtask(&self, request: SolveRequest) -> BoxFuture<'_, Result<Value, ExhaustedRetries>> {
        self.solve_request(request)
    }
}

fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        let head: String = text.chars().take(RESULT_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text
    }
}
