//! OpenAI-compatible chat completions backend.

use async_trait::async_trait;
use probe_core::metrics::METRICS;
use probe_core::LlmProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{build_client, resolve, resolve_api_key, send_json, ProviderConfig};
use crate::error::{ProviderError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatResponse {
    /// First choice's text; a `null` content is an empty completion.
    pub(crate) fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::InvalidResponse {
                backend: "openai",
                detail: "no choices in completion".to_string(),
            })
    }
}

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(model: Option<&str>, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            api_key: resolve_api_key(config.api_key.as_deref(), "openai", API_KEY_ENV)?,
            base_url: resolve(config.base_url.as_deref(), BASE_URL_ENV, DEFAULT_BASE_URL),
            max_tokens: config.max_tokens,
            client: build_client(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: self.max_tokens,
        };
        debug!(backend = "openai", model = %self.model, prompt_chars = prompt.len(), "chat completion");
        METRICS.add_provider_calls(1);

        let response: ChatResponse = send_json(
            "openai",
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request),
        )
        .await?;
        response.into_text()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> probe_core::Result<String> {
        Ok(self.complete(prompt, temperature).await?)
    }
}
