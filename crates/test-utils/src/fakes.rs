//! Scripted collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use solvedag::dag::DecompositionResult;
use solvedag::engine::{SolveRequest, SubtaskSolver};
use solvedag::errors::{ExecutionError, ExhaustedRetries, SynthesisError};
use solvedag::exec::Executor;
use solvedag::synth::{ChatModel, CodeSynthesizer, Decomposer};

type DecomposeFn =
    dyn Fn(&str, usize) -> Result<DecompositionResult, SynthesisError> + Send + Sync;

/// Decomposer driven by a closure; records `(task, target_count)` per call.
pub struct ScriptedDecomposer {
    script: Box<DecomposeFn>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedDecomposer {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, usize) -> Result<DecompositionResult, SynthesisError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(f),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Same reply for every call.
    pub fn always(result: DecompositionResult) -> Self {
        Self::from_fn(move |_, _| Ok(result.clone()))
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_, _| Err(SynthesisError::Parse(message.clone())))
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Decomposer for ScriptedDecomposer {
    async fn decompose(
        &self,
        task: &str,
        target_count: usize,
    ) -> Result<DecompositionResult, SynthesisError> {
        self.calls
            .lock()
            .unwrap()
            .push((task.to_string(), target_count));
        (self.script)(task, target_count)
    }
}

type ReplyFn = dyn Fn(&str, &str) -> Result<String, SynthesisError> + Send + Sync;

/// Chat backend driven by a closure over `(system, user)`; records the user
/// prompt of every call.
pub struct ScriptedChatModel {
    name: String,
    reply: Box<ReplyFn>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChatModel {
    pub fn from_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, SynthesisError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            reply: Box::new(f),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(name, move |_, _| Ok(text.clone()))
    }

    /// Every call fails with an API error carrying `status`.
    pub fn failing(name: &str, status: u16) -> Self {
        let body = format!("{name} unavailable");
        Self::from_fn(name, move |_, _| {
            Err(SynthesisError::Api {
                status,
                body: body.clone(),
            })
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, SynthesisError> {
        let reply = (self.reply)(system, &user);
        self.prompts.lock().unwrap().push(user);
        reply
    }
}

/// One call made to a [`ScriptedSynthesizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthCall {
    Generate { task: String },
    Fix { program: String, error: String },
}

type GenerateFn = dyn Fn(&str) -> String + Send + Sync;
type FixFn = dyn Fn(&str, &str) -> String + Send + Sync;

/// Synthesizer driven by closures; records every call.
pub struct ScriptedSynthesizer {
    generate: Box<GenerateFn>,
    fix: Box<FixFn>,
    calls: Mutex<Vec<SynthCall>>,
}

impl ScriptedSynthesizer {
    pub fn new<G, F>(generate: G, fix: F) -> Self
    where
        G: Fn(&str) -> String + Send + Sync + 'static,
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Self {
            generate: Box::new(generate),
            fix: Box::new(fix),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Program text is the task itself; fixes append `# fixed`.
    pub fn echo() -> Self {
        Self::new(
            |task| task.to_string(),
            |program, _| format!("{program}\n# fixed"),
        )
    }

    pub fn calls(&self) -> Vec<SynthCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeSynthesizer for ScriptedSynthesizer {
    async fn generate(&self, task: &str) -> Result<String, SynthesisError> {
        self.calls.lock().unwrap().push(SynthCall::Generate {
            task: task.to_string(),
        });
        Ok((self.generate)(task))
    }

    async fn fix(&self, program: &str, error: &str) -> Result<String, SynthesisError> {
        self.calls.lock().unwrap().push(SynthCall::Fix {
            program: program.to_string(),
            error: error.to_string(),
        });
        Ok((self.fix)(program, error))
    }
}

type ValueFn = dyn Fn(&str) -> Value + Send + Sync;

/// Executor that fails its first `failures` runs, then maps the program to
/// a value. Records every program it was given.
pub struct FlakyExecutor {
    failures: usize,
    value: Box<ValueFn>,
    programs: Mutex<Vec<String>>,
}

impl FlakyExecutor {
    pub fn new<F>(failures: usize, value: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        Self {
            failures,
            value: Box::new(value),
            programs: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(value: Value) -> Self {
        Self::new(0, move |_| value.clone())
    }

    pub fn programs(&self) -> Vec<String> {
        self.programs.lock().unwrap().clone()
    }

    pub fn runs(&self) -> usize {
        self.programs.lock().unwrap().len()
    }
}

#[async_trait]
impl Executor for FlakyExecutor {
    async fn run(&self, program: &str) -> Result<Value, ExecutionError> {
        let run_index = {
            let mut programs = self.programs.lock().unwrap();
            programs.push(program.to_string());
            programs.len()
        };
        if run_index <= self.failures {
            return Err(ExecutionError::Failed {
                code: 1,
                stderr: format!("boom #{run_index}"),
            });
        }
        Ok((self.value)(program))
    }
}

type RequestValueFn = dyn Fn(&SolveRequest) -> Value + Send + Sync;

/// Subtask solver that fails the first `k` attempts of selected subtasks,
/// then answers through a closure. Records every request and tracks how
/// many calls were in flight at once.
pub struct FlakySubtaskSolver {
    failures: HashMap<String, usize>,
    attempts: Mutex<HashMap<String, usize>>,
    value: Box<RequestValueFn>,
    requests: Mutex<Vec<SolveRequest>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakySubtaskSolver {
    /// Answers `"<subtask id> done"` for every request.
    pub fn new() -> Self {
        Self::with_value(|req| {
            let id = req
                .parent
                .as_ref()
                .map(|p| p.subtask_id.clone())
                .unwrap_or_default();
            Value::String(format!("{id} done"))
        })
    }

    pub fn with_value<F>(value: F) -> Self
    where
        F: Fn(&SolveRequest) -> Value + Send + Sync + 'static,
    {
        Self {
            failures: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
            value: Box::new(value),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail the first `k` attempts for `subtask_id`.
    pub fn failing(mut self, subtask_id: &str, k: usize) -> Self {
        self.failures.insert(subtask_id.to_string(), k);
        self
    }

    /// Hold every call for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<SolveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, subtask_id: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(subtask_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for FlakySubtaskSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtaskSolver for FlakySubtaskSolver {
    fn solve_subtask(&self, request: SolveRequest) -> BoxFuture<'_, Result<Value, ExhaustedRetries>> {
        async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let id = request
                .parent
                .as_ref()
                .map(|p| p.subtask_id.clone())
                .unwrap_or_default();
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(id.clone()).or_insert(0);
                *n += 1;
                *n
            };
            self.requests.lock().unwrap().push(request.clone());

            let result = if attempt <= self.failures.get(&id).copied().unwrap_or(0) {
                Err(ExhaustedRetries {
                    retries: request.max_retries,
                    message: format!("{id} attempt {attempt} failed"),
                })
            } else {
                Ok((self.value)(&request))
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
        .boxed()
    }
}
