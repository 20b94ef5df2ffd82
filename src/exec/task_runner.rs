// src/exec/task_runner.rs

//! Running one program file as a child process.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::ExecutionError;

const OUTPUT_PREVIEW_CHARS: usize = 500;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `interpreter file` inside `dir`, capturing stdout/stderr.
///
/// The child is killed if `timeout` elapses first.
pub async fn run_program(
    interpreter: &str,
    dir: &Path,
    file: &str,
    timeout: Duration,
) -> Result<ProcessOutput, ExecutionError> {
    info!(
        interpreter,
        dir = %dir.display(),
        file,
        "starting program process"
    );
    let started = Instant::now();

    let mut cmd = Command::new(interpreter);
    cmd.arg(file)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ExecutionError::Io(format!("spawning '{interpreter}': {e}")))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(res) => res.map_err(|e| ExecutionError::Io(format!("waiting for process: {e}")))?,
        Err(_) => {
            warn!(interpreter, ?timeout, "program timed out; killing process");
            return Err(ExecutionError::Timeout(timeout));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let code = output.status.code().unwrap_or(-1);

    debug!(stdout = %preview(&stdout), stderr = %preview(&stderr), "program output");
    info!(
        exit_code = code,
        success = output.status.success(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "program process exited"
    );

    Ok(ProcessOutput {
        success: output.status.success(),
        code,
        stdout,
        stderr,
        elapsed: started.elapsed(),
    })
}

fn preview(text: &str) -> String {
    if text.chars().count() > OUTPUT_PREVIEW_CHARS {
        let head: String = text.chars().take(OUTPUT_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
