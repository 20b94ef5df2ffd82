// src/exec/mod.rs

//! Program execution layer.
//!
//! - [`backend`] provides the [`Executor`] trait and the production
//!   [`PythonExecutor`].
//! - [`harness`] instruments programs so their `result` value is captured.
//! - [`task_runner`] spawns and waits for a single interpreter process.

pub mod backend;
pub mod harness;
pub mod task_runner;

pub use backend::{Executor, PythonExecutor};
