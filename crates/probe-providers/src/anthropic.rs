//! Anthropic Messages API backend.

use async_trait::async_trait;
use probe_core::metrics::METRICS;
use probe_core::LlmProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{build_client, resolve, resolve_api_key, send_json, ProviderConfig};
use crate::error::Result;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    /// Text of the first content block; no content is an empty completion.
    pub(crate) fn into_text(self) -> String {
        self.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default()
    }
}

pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: Option<&str>, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            api_key: resolve_api_key(config.api_key.as_deref(), "anthropic", API_KEY_ENV)?,
            base_url: resolve(config.base_url.as_deref(), BASE_URL_ENV, DEFAULT_BASE_URL),
            max_tokens: config.max_tokens,
            client: build_client(config)?,
        })
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        debug!(backend = "anthropic", model = %self.model, prompt_chars = prompt.len(), "messages call");
        METRICS.add_provider_calls(1);

        let response: MessagesResponse = send_json(
            "anthropic",
            self.client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&request),
        )
        .await?;
        Ok(response.into_text())
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> probe_core::Result<String> {
        Ok(self.complete(prompt, temperature).await?)
    }
}
