// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ConfigFile;

/// Command-line arguments for `solvedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "solvedag",
    version,
    about = "Solve a task by recursive decomposition into a DAG of generated programs.",
    long_about = None
)]
pub struct CliArgs {
    /// The task to solve.
    #[arg(value_name = "TASK")]
    pub task: String,

    /// Decomposition depth; 1 solves the task directly.
    #[arg(short, long, value_name = "N")]
    pub depth: Option<u32>,

    /// Retries after the first attempt of each solver invocation.
    #[arg(short = 'r', long = "retries", value_name = "N")]
    pub retries: Option<u32>,

    /// Retries per subtask (defaults to `--retries`).
    #[arg(long, value_name = "N")]
    pub subtask_retries: Option<u32>,

    /// Subtasks of one level running at the same time.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Solvedag.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model used for decomposition and code synthesis.
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    #[arg(long, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// API key; overrides the environment variable named in the config.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SOLVEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Decompose once and print the plan; execute nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply flag overrides on top of a loaded config.
    pub fn apply_overrides(&self, cfg: &mut ConfigFile) {
        if let Some(depth) = self.depth {
            cfg.solver.depth = depth;
        }
        if let Some(retries) = self.retries {
            cfg.solver.max_retries = retries;
        }
        if let Some(retries) = self.subtask_retries {
            cfg.solver.subtask_retries = Some(retries);
        }
        if let Some(concurrency) = self.concurrency {
            cfg.solver.max_concurrency = concurrency;
        }
        if let Some(model) = &self.model {
            cfg.synthesizer.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            cfg.synthesizer.max_tokens = max_tokens;
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
