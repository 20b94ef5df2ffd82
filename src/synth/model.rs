// src/synth/model.rs

//! Chat-completion backends and the client that turns them into a
//! [`Decomposer`] and a [`CodeSynthesizer`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dag::DecompositionResult;
use crate::errors::SynthesisError;

use super::parse::{parse_decomposition, strip_code_fences};
use super::{CodeSynthesizer, Decomposer};

const GENERATE_SYSTEM: &str = "You are an expert Python programmer tasked with generating concise, \
executable Python code. Your code must set a variable named 'result' to the final answer; it must be \
JSON-serializable. Handle edge cases appropriately. Do not include explanations, just the code.";

const FIX_SYSTEM: &str = "You are an expert Python programmer tasked with fixing bugs in code. Your \
fixed code must set a variable named 'result' to the final answer; it must be JSON-serializable. \
Return only the fixed code without explanations.";

const DECOMPOSE_SYSTEM: &str = "You are an expert in task decomposition. Break complex tasks into \
simpler subtasks, each small enough to be accomplished with a single Python function. Reply with a \
JSON array of strings, in execution order. If some subtasks are independent, you may instead reply \
with a JSON object {\"subproblems\": [[id, description, [dependency ids]], ...], \"aggregation\": \
\"<id of the subtask holding the final answer>\"}.";

/// One system + user exchange with a hosted model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short label for logs and the CLI banner, e.g. `anthropic/claude-...`.
    fn describe(&self) -> String;

    /// The model's reply text, trimmed.
    async fn complete(&self, system: &str, user: String) -> Result<String, SynthesisError>;
}

/// Prompts a primary [`ChatModel`] and, when one is configured, retries a
/// failed call once against a fallback model.
#[derive(Clone)]
pub struct ModelClient {
    primary: Arc<dyn ChatModel>,
    fallback: Option<Arc<dyn ChatModel>>,
}

impl ModelClient {
    pub fn new(primary: Arc<dyn ChatModel>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ChatModel>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn describe(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!("{} (fallback {})", self.primary.describe(), fallback.describe()),
            None => self.primary.describe(),
        }
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, SynthesisError> {
        let Some(fallback) = &self.fallback else {
            return self.primary.complete(system, user).await;
        };

        match self.primary.complete(system, user.clone()).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(
                    primary = %self.primary.describe(),
                    fallback = %fallback.describe(),
                    error = %err,
                    "primary model failed; using fallback"
                );
                fallback.complete(system, user).await
            }
        }
    }
}

#[async_trait]
impl CodeSynthesizer for ModelClient {
    async fn generate(&self, task: &str) -> Result<String, SynthesisError> {
        let reply = self
            .complete(GENERATE_SYSTEM, format!("Generate Python code to solve: '{task}'"))
            .await?;
        Ok(strip_code_fences(&reply))
    }

    async fn fix(&self, program: &str, error: &str) -> Result<String, SynthesisError> {
        let reply = self
            .complete(
                FIX_SYSTEM,
                format!(
                    "Fix this Python code that has the following error:\n\nERROR: {error}\n\nCODE:\n{program}"
                ),
            )
            .await?;
        Ok(strip_code_fences(&reply))
    }
}

#[async_trait]
impl Decomposer for ModelClient {
    async fn decompose(
        &self,
        task: &str,
        target_count: usize,
    ) -> Result<DecompositionResult, SynthesisError> {
        let reply = self
            .complete(
                DECOMPOSE_SYSTEM,
                format!("Decompose the following task into {target_count} subtasks: '{task}'"),
            )
            .await?;
        debug!(chars = reply.len(), "decomposition reply received");
        parse_decomposition(&reply, target_count)
    }
}
