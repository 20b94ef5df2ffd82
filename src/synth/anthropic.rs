// src/synth/anthropic.rs

//! Anthropic Messages API backend.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::errors::SynthesisError;

use super::model::ChatModel;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Connection settings, resolved from config + CLI.
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    /// `None` means "not configured"; calls fail with `NotConfigured`.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
}

pub struct AnthropicClient {
    client: reqwest::Client,
    settings: AnthropicSettings,
}

impl AnthropicClient {
    pub fn new(settings: AnthropicSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn describe(&self) -> String {
        format!("anthropic/{}", self.settings.model)
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, SynthesisError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            SynthesisError::NotConfigured("no Anthropic API key available".to_string())
        })?;

        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });

        debug!(model = %self.settings.model, "anthropic request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let text = resp["content"][0]["text"]
            .as_str()
            .ok_or_else(|| SynthesisError::Parse("missing content[0].text".into()))?
            .trim()
            .to_string();

        Ok(text)
    }
}
