// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod state;
pub mod synth;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, validate_config, ConfigFile};
use crate::engine::{Plan, Solver, SolverContext, SolverOptions};
use crate::errors::SolvedagError;
use crate::events::{EventSink, TracingSink};
use crate::exec::PythonExecutor;
use crate::state::FsStateStore;
use crate::synth::{AnthropicClient, AnthropicSettings, ModelClient, OpenAiClient, OpenAiSettings};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - the model client (Anthropic, with an optional OpenAI fallback)
/// - the Python executor
/// - the filesystem state store
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    args.apply_overrides(&mut cfg);
    validate_config(&cfg)?;

    let api_key = resolve_api_key(args.api_key.as_deref(), &cfg.synthesizer.api_key_env);
    let fallback_key = resolve_api_key(None, &cfg.synthesizer.fallback_api_key_env);
    if api_key.is_none() && fallback_key.is_none() {
        warn!(
            env = %cfg.synthesizer.api_key_env,
            fallback_env = %cfg.synthesizer.fallback_api_key_env,
            "no API key configured; synthesis calls will fail"
        );
    }

    let solver = build_solver(&cfg, api_key, fallback_key, Arc::new(TracingSink));
    let depth = cfg.solver.depth;

    print_banner(&args.task, depth, &cfg);

    if args.dry_run {
        let plan = solver.plan(&args.task, depth).await?;
        print_plan(&plan);
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let started = Instant::now();
    let outcome = tokio::select! {
        res = solver.solve(&args.task, depth, cfg.solver.max_retries) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received; abandoning run");
            return Err(anyhow::anyhow!("interrupted"));
        }
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(value) => {
            print_summary(&value, elapsed);
            Ok(())
        }
        Err(err) => {
            println!();
            println!("Task failed: {err}");
            println!("Total execution time: {:.2} seconds", elapsed.as_secs_f64());
            Err(SolvedagError::from(err).into())
        }
    }
}

/// Assemble a production solver from a validated config.
///
/// The OpenAI fallback is only wired in when `fallback_key` is present.
pub fn build_solver(
    cfg: &ConfigFile,
    api_key: Option<String>,
    fallback_key: Option<String>,
    events: Arc<dyn EventSink>,
) -> Solver {
    let synth = &cfg.synthesizer;
    let mut client = ModelClient::new(Arc::new(AnthropicClient::new(AnthropicSettings {
        api_key,
        model: synth.model.clone(),
        max_tokens: synth.max_tokens,
        temperature: synth.temperature,
        base_url: synth.base_url.clone(),
    })));
    if fallback_key.is_some() {
        client = client.with_fallback(Arc::new(OpenAiClient::new(OpenAiSettings {
            api_key: fallback_key,
            model: synth.fallback_model.clone(),
            max_tokens: synth.max_tokens,
            temperature: synth.temperature,
            base_url: synth.fallback_base_url.clone(),
            organization: synth.fallback_organization.clone(),
        })));
    }
    debug!(model = %client.describe(), "model client ready");
    let client = Arc::new(client);

    let executor = PythonExecutor::new(
        cfg.executor.interpreter.clone(),
        Duration::from_secs(cfg.executor.timeout_secs),
        cfg.executor.effective_work_dir(),
    );

    let ctx = SolverContext {
        decomposer: client.clone(),
        synthesizer: client,
        executor: Arc::new(executor),
        events,
        state: Arc::new(FsStateStore::new(cfg.state.run_dir.clone())),
    };

    Solver::new(ctx, solver_options(cfg))
}

pub fn solver_options(cfg: &ConfigFile) -> SolverOptions {
    SolverOptions {
        retry_backoff: Duration::from_millis(cfg.solver.retry_backoff_ms),
        subtask_retries: cfg.solver.subtask_retries,
        max_concurrency: cfg.solver.max_concurrency,
        input_preview_len: cfg.solver.input_preview_len,
    }
}

/// The flag wins; otherwise the environment variable named by `env_name`.
/// Blank values count as missing.
pub fn resolve_api_key(flag: Option<&str>, env_name: &str) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var(env_name).ok())
        .filter(|key| !key.trim().is_empty())
}

fn print_banner(task: &str, depth: u32, cfg: &ConfigFile) {
    let rule = "=".repeat(80);
    println!("{rule}");
    println!("solvedag");
    println!("{rule}");
    println!("Task:       {task}");
    println!("Depth:      {depth}");
    println!("Model:      {}", cfg.synthesizer.model);
    println!("Retries:    {}", cfg.solver.max_retries);
    println!("Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{rule}");
}

fn print_plan(plan: &Plan) {
    println!("strategy: {:?}", plan.decomposition.strategy);
    for repair in &plan.decomposition.repairs {
        println!("  repair: {repair}");
    }
    println!();

    println!("subproblems ({}):", plan.decomposition.subproblems.len());
    for sp in &plan.decomposition.subproblems {
        println!("  - {}: {}", sp.id, sp.description);
        if !sp.dependencies.is_empty() {
            println!("      after: {:?}", sp.dependencies);
        }
    }
    println!();

    println!("levels ({}):", plan.levels.len());
    for (index, level) in plan.levels.iter().enumerate() {
        let ids: Vec<&str> = level.iter().map(|sp| sp.id.as_str()).collect();
        println!("  {index}: {ids:?}");
    }
    println!();

    match plan.decomposition.aggregation.target() {
        Some(target) => println!("aggregation: {target}"),
        None => println!("aggregation: last subtask"),
    }
}

fn print_summary(value: &serde_json::Value, elapsed: Duration) {
    let rule = "=".repeat(80);
    let rendered = match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    println!();
    println!("{rule}");
    println!("Final result:");
    println!("{rendered}");
    println!("{rule}");
    println!("Total execution time: {:.2} seconds", elapsed.as_secs_f64());
}
