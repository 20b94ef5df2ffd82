// src/errors.rs

//! Crate-wide error types.
//!
//! Every layer below the [`Solver`](crate::engine::Solver) degrades instead of
//! raising: graph problems are repaired, failed subtasks become sentinel
//! values, aggregation falls back to the last subtask. The only error that
//! leaves the engine is [`ExhaustedRetries`].

use std::time::Duration;

use thiserror::Error;

/// The upstream code / decomposition generator failed.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("synthesizer not configured: {0}")]
    NotConfigured(String),
}

/// A generated program failed to run or produced no captured value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Execution failed with return code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("program finished without setting a `result` value")]
    MissingValue,

    #[error("captured result is not valid JSON: {0}")]
    InvalidValue(String),

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not run program: {0}")]
    Io(String),
}

/// Structural problems in a decomposition.
///
/// Only [`GraphError::Empty`] ever reaches the solver; the other variants are
/// repaired by the chain fallback inside [`GraphBuilder`](crate::dag::GraphBuilder).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("decomposition produced no subtasks")]
    Empty,

    #[error("subtask with an empty id")]
    EmptyId,

    #[error("duplicate subtask id '{0}'")]
    DuplicateId(String),

    #[error("circular dependency detected involving node {0}")]
    Cycle(String),
}

/// The aggregation target could not be resolved against the result map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("aggregation target '{0}' has no recorded result")]
    MissingTarget(String),

    #[error("aggregation spec does not name a subtask")]
    Unspecified,
}

/// Durable state could not be written or read.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state IO error: {0}")]
    Io(#[from] anyhow::Error),

    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single solver attempt failed.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A solver invocation used up its retry budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task failed after {retries} retries: {message}")]
pub struct ExhaustedRetries {
    pub retries: u32,
    /// Message of the last underlying error.
    pub message: String,
}

/// Application-level error used by the CLI shell and config loading.
#[derive(Error, Debug)]
pub enum SolvedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Solve(#[from] ExhaustedRetries),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SolvedagError>;
