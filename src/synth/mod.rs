// src/synth/mod.rs

//! Collaborators that turn task text into programs or subtasks.
//!
//! - [`Decomposer`] splits a task into subtask descriptions (optionally with
//!   explicit dependencies).
//! - [`CodeSynthesizer`] writes a program for a task, or fixes one given an
//!   error.
//! - [`model`] implements both traits on top of any [`ChatModel`], with an
//!   optional fallback model.
//! - [`anthropic`] and [`openai`] are the hosted [`ChatModel`] backends.
//! - [`parse`] turns raw model replies into those shapes.

pub mod anthropic;
pub mod model;
pub mod openai;
pub mod parse;

use async_trait::async_trait;

use crate::dag::DecompositionResult;
use crate::errors::SynthesisError;

pub use anthropic::{AnthropicClient, AnthropicSettings};
pub use model::{ChatModel, ModelClient};
pub use openai::{OpenAiClient, OpenAiSettings};

#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Split `task` into about `target_count` subtasks. The returned length is
    /// not guaranteed to match.
    async fn decompose(
        &self,
        task: &str,
        target_count: usize,
    ) -> Result<DecompositionResult, SynthesisError>;
}

#[async_trait]
pub trait CodeSynthesizer: Send + Sync {
    /// Write a program whose `result` variable holds the answer to `task`.
    async fn generate(&self, task: &str) -> Result<String, SynthesisError>;

    /// Repair `program` given the error it produced.
    async fn fix(&self, program: &str, error: &str) -> Result<String, SynthesisError>;
}
