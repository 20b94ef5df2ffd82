// tests/config_validation.rs

mod common;
use crate::common::init_tracing;

use std::io::Write;
use std::time::Duration;

use clap::Parser;

use solvedag::cli::CliArgs;
use solvedag::config::{load_and_validate, load_or_default, validate_config, ConfigFile};
use solvedag::errors::SolvedagError;
use solvedag::{resolve_api_key, solver_options};
use solvedag_test_utils::builders::ConfigFileBuilder;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_documented_values() {
    init_tracing();

    let cfg = ConfigFile::default();

    assert_eq!(cfg.solver.depth, 1);
    assert_eq!(cfg.solver.max_retries, 3);
    assert_eq!(cfg.solver.subtask_retries, None);
    assert_eq!(cfg.solver.retry_backoff_ms, 1000);
    assert_eq!(cfg.solver.max_concurrency, 4);
    assert_eq!(cfg.solver.input_preview_len, 100);
    assert_eq!(cfg.synthesizer.model, "claude-3-7-sonnet-20250219");
    assert_eq!(cfg.synthesizer.max_tokens, 4096);
    assert_eq!(cfg.synthesizer.api_key_env, "ANTHROPIC_API_KEY");
    assert_eq!(cfg.synthesizer.fallback_model, "gpt-4o-2024-05-13");
    assert_eq!(cfg.synthesizer.fallback_api_key_env, "OPENAI_API_KEY");
    assert_eq!(cfg.synthesizer.fallback_organization, None);
    assert_eq!(cfg.executor.interpreter, "python3");
    assert_eq!(cfg.executor.timeout_secs, 120);
    assert_eq!(cfg.state.run_dir, std::path::PathBuf::from("run"));
}

#[test]
fn partial_file_fills_in_defaults_and_tolerates_unknown_keys() {
    init_tracing();

    let file = write_config(
        r#"
        [solver]
        depth = 3
        subtask_retries = 1
        future_option = true

        [executor]
        interpreter = "python3.12"
        "#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.solver.depth, 3);
    assert_eq!(cfg.solver.subtask_retries, Some(1));
    assert_eq!(cfg.solver.max_retries, 3);
    assert_eq!(cfg.executor.interpreter, "python3.12");
    assert_eq!(cfg.executor.timeout_secs, 120);
}

#[test]
fn invalid_values_are_rejected() {
    init_tracing();

    let cases = [
        "[solver]\ndepth = 0",
        "[solver]\nmax_concurrency = 0",
        "[solver]\ninput_preview_len = 3",
        "[synthesizer]\nmax_tokens = 0",
        "[synthesizer]\nfallback_model = \"\"",
        "[executor]\ninterpreter = \"  \"",
        "[executor]\ntimeout_secs = 0",
    ];

    for case in cases {
        let file = write_config(case);
        let err = load_and_validate(file.path()).unwrap_err();
        assert!(
            matches!(err, SolvedagError::ConfigError(_)),
            "expected config error for {case:?}, got {err:?}"
        );
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    init_tracing();

    let file = write_config("[solver\ndepth = ");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, SolvedagError::TomlError(_)));
}

#[test]
fn explicit_missing_path_is_an_io_error() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let err = load_or_default(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
    assert!(matches!(err, SolvedagError::IoError(_)));
}

#[test]
fn cli_flags_override_file_values() {
    init_tracing();

    let mut cfg = ConfigFileBuilder::new().depth(2).max_retries(5).build();
    let args = CliArgs::parse_from([
        "solvedag",
        "sum numbers",
        "--depth",
        "4",
        "-r",
        "1",
        "--subtask-retries",
        "0",
        "--concurrency",
        "8",
        "--model",
        "other-model",
        "--max-tokens",
        "512",
    ]);

    args.apply_overrides(&mut cfg);
    validate_config(&cfg).unwrap();

    assert_eq!(args.task, "sum numbers");
    assert_eq!(cfg.solver.depth, 4);
    assert_eq!(cfg.solver.max_retries, 1);
    assert_eq!(cfg.solver.subtask_retries, Some(0));
    assert_eq!(cfg.solver.max_concurrency, 8);
    assert_eq!(cfg.synthesizer.model, "other-model");
    assert_eq!(cfg.synthesizer.max_tokens, 512);

    let options = solver_options(&cfg);
    assert_eq!(options.subtask_retries, Some(0));
    assert_eq!(options.max_concurrency, 8);
    assert_eq!(options.retry_backoff, Duration::from_millis(1000));
}

#[test]
fn override_to_invalid_value_fails_revalidation() {
    init_tracing();

    let mut cfg = ConfigFile::default();
    let args = CliArgs::parse_from(["solvedag", "task", "--depth", "0"]);

    args.apply_overrides(&mut cfg);

    assert!(validate_config(&cfg).is_err());
}

#[test]
fn api_key_flag_wins_over_environment() {
    init_tracing();

    // A variable name no test environment defines.
    let env = "SOLVEDAG_TEST_UNSET_KEY_7F3A";

    assert_eq!(
        resolve_api_key(Some("sk-flag"), env).as_deref(),
        Some("sk-flag")
    );
    assert_eq!(resolve_api_key(None, env), None);
    assert_eq!(resolve_api_key(Some("   "), env), None);
}
