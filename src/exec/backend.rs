// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The solver talks to an [`Executor`] instead of spawning processes itself,
//! so tests can swap in a fake that never touches the OS.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ExecutionError;

use super::harness::{instrument, RESULT_FILE};
use super::task_runner::run_program;

const PROGRAM_FILE: &str = "main.py";

/// Runs a program and returns the value it captured.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Fails with [`ExecutionError`] on non-zero exit or when no value was
    /// captured.
    async fn run(&self, program: &str) -> Result<Value, ExecutionError>;
}

/// Production executor: writes the program (plus capture harness) into a
/// fresh directory, runs the interpreter there and reads `result.json`.
#[derive(Debug, Clone)]
pub struct PythonExecutor {
    interpreter: String,
    timeout: Duration,
    work_dir: PathBuf,
}

impl PythonExecutor {
    pub fn new(interpreter: impl Into<String>, timeout: Duration, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            work_dir: work_dir.into(),
        }
    }

    async fn run_in(&self, dir: &Path, program: &str) -> Result<Value, ExecutionError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ExecutionError::Io(format!("creating {}: {e}", dir.display())))?;
        tokio::fs::write(dir.join(PROGRAM_FILE), instrument(program))
            .await
            .map_err(|e| ExecutionError::Io(format!("writing program: {e}")))?;

        let output = run_program(&self.interpreter, dir, PROGRAM_FILE, self.timeout).await?;
        if !output.success {
            return Err(ExecutionError::Failed {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let captured = match tokio::fs::read_to_string(dir.join(RESULT_FILE)).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecutionError::MissingValue);
            }
            Err(e) => return Err(ExecutionError::Io(format!("reading result: {e}"))),
        };

        let mut parsed: Value = serde_json::from_str(&captured)
            .map_err(|e| ExecutionError::InvalidValue(e.to_string()))?;
        match parsed.get_mut("result") {
            Some(value) => Ok(value.take()),
            None => Err(ExecutionError::MissingValue),
        }
    }
}

#[async_trait]
impl Executor for PythonExecutor {
    async fn run(&self, program: &str) -> Result<Value, ExecutionError> {
        let dir = self.work_dir.join(Uuid::new_v4().simple().to_string());
        debug!(dir = %dir.display(), "executing program");

        let result = self.run_in(&dir, program).await;

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "failed to clean up execution directory");
        }
        result
    }
}
