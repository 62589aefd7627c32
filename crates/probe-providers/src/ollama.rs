//! Local Ollama server backend.

use async_trait::async_trait;
use probe_core::metrics::METRICS;
use probe_core::LlmProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{build_client, resolve, send_json, ProviderConfig};
use crate::error::Result;

pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaProvider {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(model: Option<&str>, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: resolve(config.base_url.as_deref(), HOST_ENV, DEFAULT_BASE_URL),
            client: build_client(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        debug!(backend = "ollama", model = %self.model, prompt_chars = prompt.len(), "generate");
        METRICS.add_provider_calls(1);

        let response: GenerateResponse = send_json(
            "ollama",
            self.client
                .post(format!("{}/api/generate", self.base_url))
                .json(&request),
        )
        .await?;
        Ok(response.response)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> probe_core::Result<String> {
        Ok(self.complete(prompt, temperature).await?)
    }

    /// One prompt at a time: a local server serializes requests anyway.
    async fn generate_batch(
        &self,
        prompts: &[String],
        temperature: f32,
    ) -> probe_core::Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            outputs.push(self.complete(prompt, temperature).await?);
        }
        Ok(outputs)
    }
}
