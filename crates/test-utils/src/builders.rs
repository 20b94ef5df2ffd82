#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use solvedag::config::{ConfigFile, RawConfigFile};
use solvedag::dag::{AggregationSpec, DecompositionResult, Subproblem, SubtaskId};
use solvedag::engine::{Solver, SolverContext, SolverOptions};
use solvedag::events::MemorySink;
use solvedag::exec::Executor;
use solvedag::fs::mock::MockFileSystem;
use solvedag::state::FsStateStore;
use solvedag::synth::{CodeSynthesizer, Decomposer};

use crate::fakes::{FlakyExecutor, ScriptedDecomposer, ScriptedSynthesizer};

/// Builder for `DecompositionResult::StructuredHint`.
#[derive(Debug, Default)]
pub struct StructuredHintBuilder {
    subproblems: Vec<Subproblem>,
    levels: Option<Vec<Vec<SubtaskId>>>,
    aggregation: Option<AggregationSpec>,
}

impl StructuredHintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subproblem(mut self, id: &str, description: &str, deps: &[&str]) -> Self {
        self.subproblems
            .push(Subproblem::new(id, description, deps.iter().copied()));
        self
    }

    pub fn level(mut self, ids: &[&str]) -> Self {
        self.levels
            .get_or_insert_with(Vec::new)
            .push(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn aggregate(mut self, expr: &str) -> Self {
        self.aggregation = Some(AggregationSpec::parse(expr));
        self
    }

    pub fn build(self) -> DecompositionResult {
        DecompositionResult::StructuredHint {
            subproblems: self.subproblems,
            levels: self.levels,
            aggregation: self.aggregation,
        }
    }
}

/// Chain hint from plain descriptions.
pub fn chain_hint(descriptions: &[&str]) -> DecompositionResult {
    DecompositionResult::ChainHint(descriptions.iter().map(|s| s.to_string()).collect())
}

/// Builder for a validated `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.config.solver.depth = depth;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.solver.max_retries = retries;
        self
    }

    pub fn subtask_retries(mut self, retries: u32) -> Self {
        self.config.solver.subtask_retries = Some(retries);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.solver.max_concurrency = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A `Solver` wired to fakes, an in-memory event sink and an in-memory
/// state store rooted at `run/`. Back-off defaults to zero.
pub struct SolverFixture {
    pub decomposer: Arc<dyn Decomposer>,
    pub synthesizer: Arc<dyn CodeSynthesizer>,
    pub executor: Arc<dyn Executor>,
    pub events: MemorySink,
    pub fs: MockFileSystem,
    pub options: SolverOptions,
}

impl SolverFixture {
    pub fn new() -> Self {
        Self {
            decomposer: Arc::new(ScriptedDecomposer::failing("no decomposer scripted")),
            synthesizer: Arc::new(ScriptedSynthesizer::echo()),
            executor: Arc::new(FlakyExecutor::returning(serde_json::Value::Null)),
            events: MemorySink::new(),
            fs: MockFileSystem::new(),
            options: SolverOptions {
                retry_backoff: Duration::ZERO,
                ..SolverOptions::default()
            },
        }
    }

    pub fn decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn CodeSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> FsStateStore<MockFileSystem> {
        FsStateStore::with_fs("run", self.fs.clone())
    }

    pub fn build(&self) -> Solver {
        Solver::new(
            SolverContext {
                decomposer: Arc::clone(&self.decomposer),
                synthesizer: Arc::clone(&self.synthesizer),
                executor: Arc::clone(&self.executor),
                events: Arc::new(self.events.clone()),
                state: Arc::new(self.store()),
            },
            self.options,
        )
    }
}

impl Default for SolverFixture {
    fn default() -> Self {
        Self::new()
    }
}
