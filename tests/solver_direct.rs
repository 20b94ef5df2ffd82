// tests/solver_direct.rs

mod common;
use crate::common::init_tracing;

use std::sync::Arc;

use serde_json::json;

use solvedag::errors::ExhaustedRetries;
use solvedag::events::EventLevel;
use solvedag::fs::FileSystem;
use solvedag::state::Record;
use solvedag_test_utils::builders::SolverFixture;
use solvedag_test_utils::fakes::{FlakyExecutor, ScriptedDecomposer, ScriptedSynthesizer, SynthCall};
use solvedag_test_utils::with_timeout;

const FACTORIAL: &str = "import math\nresult = math.factorial(10)";

fn factorial_synth() -> Arc<ScriptedSynthesizer> {
    Arc::new(ScriptedSynthesizer::new(
        |_| FACTORIAL.to_string(),
        |program, _| format!("{program}\n# fixed"),
    ))
}

#[tokio::test]
async fn depth_one_generates_and_executes() {
    init_tracing();

    let synth = factorial_synth();
    let executor = Arc::new(FlakyExecutor::returning(json!(3628800)));
    let decomposer = Arc::new(ScriptedDecomposer::failing("must not be called"));
    let fixture = SolverFixture::new()
        .synthesizer(synth.clone())
        .executor(executor.clone())
        .decomposer(decomposer.clone());
    let solver = fixture.build();

    let value = with_timeout(solver.solve("compute factorial of 10", 1, 3))
        .await
        .unwrap();

    assert_eq!(value, json!(3628800));
    assert_eq!(
        synth.calls(),
        vec![SynthCall::Generate {
            task: "compute factorial of 10".to_string()
        }]
    );
    assert_eq!(executor.programs(), vec![FACTORIAL.to_string()]);
    assert!(decomposer.calls().is_empty());
}

#[tokio::test]
async fn failed_execution_is_fixed_and_retried() {
    init_tracing();

    let synth = factorial_synth();
    let executor = Arc::new(FlakyExecutor::new(1, |_| json!(3628800)));
    let fixture = SolverFixture::new()
        .synthesizer(synth.clone())
        .executor(executor.clone());
    let solver = fixture.build();

    let value = with_timeout(solver.solve("compute factorial of 10", 1, 3))
        .await
        .unwrap();

    assert_eq!(value, json!(3628800));
    assert_eq!(
        synth.calls(),
        vec![
            SynthCall::Generate {
                task: "compute factorial of 10".to_string()
            },
            SynthCall::Fix {
                program: FACTORIAL.to_string(),
                error: "Execution failed with return code 1: boom #1".to_string(),
            },
        ]
    );
    assert_eq!(executor.runs(), 2);
    assert_eq!(executor.programs()[1], format!("{FACTORIAL}\n# fixed"));
}

#[tokio::test]
async fn exhausted_retries_surface_as_error() {
    init_tracing();

    let executor = Arc::new(FlakyExecutor::new(usize::MAX, |_| json!(null)));
    let fixture = SolverFixture::new().executor(executor.clone());
    let solver = fixture.build();

    let err = with_timeout(solver.solve("impossible", 1, 2))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExhaustedRetries {
            retries: 2,
            message: "Execution failed with return code 1: boom #3".to_string(),
        }
    );
    // R retries means R + 1 attempts.
    assert_eq!(executor.runs(), 3);
}

#[tokio::test]
async fn zero_retries_means_one_attempt() {
    init_tracing();

    let executor = Arc::new(FlakyExecutor::new(1, |_| json!(1)));
    let fixture = SolverFixture::new().executor(executor.clone());
    let solver = fixture.build();

    let result = solver.solve("once", 1, 0).await;

    assert!(result.is_err());
    assert_eq!(executor.runs(), 1);
}

#[tokio::test]
async fn run_records_and_program_are_persisted() {
    init_tracing();

    let fixture = SolverFixture::new()
        .synthesizer(factorial_synth())
        .executor(Arc::new(FlakyExecutor::returning(json!(3628800))));
    let solver = fixture.build();

    solver.solve("compute factorial of 10", 1, 0).await.unwrap();

    let store = fixture.store();
    let runs = store.runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].as_str().contains("_task_compute_factorial_of_10_"));

    let paths = fixture.fs.paths();
    let file_names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(file_names.contains(&Record::Run.file_name().to_string()));
    assert!(file_names.contains(&Record::Program.file_name().to_string()));

    let program_path = paths
        .iter()
        .find(|p| p.ends_with(Record::Program.file_name()))
        .unwrap();
    assert_eq!(fixture.fs.read_to_string(program_path).unwrap(), FACTORIAL);
}

#[tokio::test]
async fn events_cover_the_run_lifecycle() {
    init_tracing();

    let fixture = SolverFixture::new()
        .synthesizer(factorial_synth())
        .executor(Arc::new(FlakyExecutor::new(1, |_| json!(3628800))));
    let solver = fixture.build();

    solver.solve("compute factorial of 10", 1, 1).await.unwrap();

    let events = fixture.events.events();
    let levels: Vec<EventLevel> = events.iter().map(|e| e.level).collect();
    assert_eq!(levels.first(), Some(&EventLevel::Task));
    assert_eq!(levels.last(), Some(&EventLevel::Result));
    assert!(levels.contains(&EventLevel::Code));
    assert!(levels.contains(&EventLevel::Execution));
    assert!(levels.contains(&EventLevel::Error));
    assert!(levels.contains(&EventLevel::Success));

    let task_id = events[0].correlation.task_id;
    assert!(events.iter().all(|e| e.correlation.task_id == task_id));
    assert!(events.iter().all(|e| e.correlation.depth == 1));
    assert_eq!(fixture.events.events_for(task_id).len(), events.len());
}

#[tokio::test]
async fn persistence_failure_is_not_fatal() {
    init_tracing();

    let fixture = SolverFixture::new()
        .synthesizer(factorial_synth())
        .executor(Arc::new(FlakyExecutor::returning(json!(3628800))));
    fixture.fs.set_fail_writes(true);
    let solver = fixture.build();

    let value = solver.solve("compute factorial of 10", 1, 0).await.unwrap();

    assert_eq!(value, json!(3628800));
    assert!(fixture.fs.paths().is_empty());
    assert!(!fixture.events.events_at(EventLevel::Warning).is_empty());
}
