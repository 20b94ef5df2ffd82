// src/synth/openai.rs

//! OpenAI Chat Completions backend, used as the fallback model.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::errors::SynthesisError;

use super::model::ChatModel;

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn describe(&self) -> String {
        format!("openai/{}", self.settings.model)
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, SynthesisError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            SynthesisError::NotConfigured("no OpenAI API key available".to_string())
        })?;

        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        debug!(model = %self.settings.model, "openai request to {}", url);

        let mut request = self.client.post(&url).bearer_auth(api_key).json(&body);
        if let Some(org) = &self.settings.organization {
            request = request.header("OpenAI-Organization", org);
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SynthesisError::Parse("missing choices[0].message.content".into()))?
            .trim()
            .to_string();

        Ok(text)
    }
}
