// tests/state_recovery.rs

mod common;
use crate::common::init_tracing;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use solvedag::dag::{GraphBuilder, LevelPlanner};
use solvedag::engine::{
    Plan, ResultMap, RunKey, RunScope, SubtaskPolicy, SubtaskRunner, TaskRun,
};
use solvedag::events::MemorySink;
use solvedag::fs::mock::MockFileSystem;
use solvedag::fs::FileSystem;
use solvedag::state::{FsStateStore, Record, StateKey, StateStore};
use solvedag_test_utils::builders::{chain_hint, SolverFixture};
use solvedag_test_utils::fakes::{FlakyExecutor, FlakySubtaskSolver, ScriptedSynthesizer};

fn two_step_plan() -> Plan {
    let decomposition = GraphBuilder::build(chain_hint(&["one", "two"])).unwrap();
    let levels = LevelPlanner::plan_decomposition(&decomposition);
    Plan {
        decomposition,
        levels,
    }
}

#[tokio::test]
async fn completed_level_survives_restart_and_is_not_rerun() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let run = TaskRun::new("resume me", 2, 0, None);
    let plan = two_step_plan();

    // First process: only level 0 completes before the crash.
    {
        let store = FsStateStore::new(dir.path());
        let events = MemorySink::new();
        let scope = RunScope::new(&events, &store, run.run_key.clone(), run.correlation());
        let solver = FlakySubtaskSolver::new();
        let results = ResultMap::new();
        let policy = SubtaskPolicy {
            retries: 0,
            backoff: Duration::ZERO,
            max_concurrency: 1,
            preview_len: 100,
        };
        let runner = SubtaskRunner::new(&solver, &results, &scope, 2, policy);
        runner.run_level(&plan.levels[0]).await;
    }

    // Second process: reload what was persisted.
    let store = FsStateStore::new(dir.path());
    let record = store
        .load(&StateKey::new(&run.run_key, Record::Results))
        .await
        .unwrap()
        .expect("results record persisted");
    let results = ResultMap::from_record(&record).unwrap();

    assert_eq!(results.value_of("task_1"), Some(json!("task_1 done")));
    assert!(!results.contains("task_2"));

    let executor = Arc::new(FlakyExecutor::new(0, |program| {
        Value::String(program.to_string())
    }));
    let fixture = SolverFixture::new()
        .synthesizer(Arc::new(ScriptedSynthesizer::echo()))
        .executor(executor.clone());
    let solver = fixture.build();
    let events = MemorySink::new();
    let scope = RunScope::new(&events, &store, run.run_key.clone(), run.correlation());

    let aggregated = solver.execute_plan(&run, &scope, &plan, &results).await;

    assert_eq!(executor.runs(), 1);
    assert_eq!(executor.programs()[0], "two with inputs [\"task_1 done\"]");
    assert_eq!(aggregated.value, json!("two with inputs [\"task_1 done\"]"));

    let reloaded = store
        .load(&StateKey::new(&run.run_key, Record::Results))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ResultMap::from_record(&reloaded).unwrap().len(), 2);
}

#[tokio::test]
async fn program_record_is_stored_as_plain_text() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(dir.path());
    let key = StateKey::new(&RunKey::from_raw("20250101_120000_task_x_0badc0de"), Record::Program);

    store
        .persist(&key, &Value::String("result = 1\n".to_string()))
        .await
        .unwrap();

    let on_disk = std::fs::read_to_string(store.path_of(&key)).unwrap();
    assert_eq!(on_disk, "result = 1\n");
    assert_eq!(
        store.load(&key).await.unwrap(),
        Some(Value::String("result = 1\n".to_string()))
    );
}

#[tokio::test]
async fn missing_records_load_as_none_and_runs_are_sorted() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(dir.path().join("run"));

    assert!(store.runs().unwrap().is_empty());

    let newer = RunKey::from_raw("20250102_000000_task_b_22222222");
    let older = RunKey::from_raw("20250101_000000_task_a_11111111");
    for key in [&newer, &older] {
        store
            .persist(&StateKey::new(key, Record::Run), &json!({ "status": "running" }))
            .await
            .unwrap();
    }

    assert_eq!(store.runs().unwrap(), vec![older.clone(), newer]);
    assert_eq!(
        store
            .load(&StateKey::new(&older, Record::FinalResult))
            .await
            .unwrap(),
        None
    );
}

#[test]
fn run_key_has_timestamp_slug_and_short_id() {
    init_tracing();

    let at = chrono::Local::now();
    let id = uuid::Uuid::new_v4();
    let key = RunKey::for_task("Sum the Numbers: 1-10!", at, id);

    let expected_prefix = format!("{}_task_sum_the_numbers_1_10_", at.format("%Y%m%d_%H%M%S"));
    assert!(key.as_str().starts_with(&expected_prefix), "{key}");
    assert_eq!(
        key.as_str().len(),
        expected_prefix.len() + 8,
        "short id is 8 hex chars"
    );
}

#[test]
fn slug_is_bounded_and_never_empty() {
    init_tracing();

    assert_eq!(solvedag::engine::run::slugify("!!!"), "unknown_task");
    assert_eq!(solvedag::engine::run::slugify(&"word ".repeat(40)).chars().count(), 50);
}

/// In-memory filesystem whose writes take a while, like a slow disk.
#[derive(Debug, Clone, Default)]
struct SlowFileSystem {
    inner: MockFileSystem,
    delay: Duration,
}

impl FileSystem for SlowFileSystem {
    fn read_to_string(&self, path: &Path) -> anyhow::Result<String> {
        self.inner.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        self.inner.write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
}

#[tokio::test]
async fn slow_writes_do_not_stall_other_tasks() {
    init_tracing();

    let fs = SlowFileSystem {
        inner: MockFileSystem::new(),
        delay: Duration::from_millis(300),
    };
    let store = FsStateStore::with_fs("run", fs.clone());
    let key = StateKey::new(&RunKey::from_raw("20250101_000000_task_slow_12345678"), Record::Results);

    // Single-threaded runtime: the ticker only advances if the write yields.
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    store.persist(&key, &json!({ "task_1": 1 })).await.unwrap();
    ticker.abort();

    assert!(ticks.load(Ordering::SeqCst) >= 5, "ticks: {}", ticks.load(Ordering::SeqCst));
    assert_eq!(store.load(&key).await.unwrap(), Some(json!({ "task_1": 1 })));
}
