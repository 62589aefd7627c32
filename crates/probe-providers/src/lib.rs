//! probe-providers
//!
//! HTTP model backends implementing [`probe_core::LlmProvider`], an
//! OpenAI-compatible embedding client, and the `backend[:model]` registry
//! used by the CLI.

pub mod anthropic;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use probe_core::LlmProvider;

pub use anthropic::AnthropicProvider;
pub use config::ProviderConfig;
pub use embedding::HttpEmbedder;
pub use error::{ProviderError, Result};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Backend names accepted by [`get_provider`].
pub const BACKENDS: [&str; 3] = ["openai", "anthropic", "ollama"];

/// Split `backend[:model]`; an empty model means the backend default.
pub fn parse_model_spec(spec: &str) -> (String, Option<&str>) {
    let (backend, model) = match spec.split_once(':') {
        Some((backend, model)) => (backend, Some(model.trim()).filter(|m| !m.is_empty())),
        None => (spec, None),
    };
    (backend.trim().to_lowercase(), model)
}

/// Build the provider named by `spec`, e.g. `openai:gpt-4o-mini` or `ollama`.
pub fn get_provider(spec: &str, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let (backend, model) = parse_model_spec(spec);
    let provider: Arc<dyn LlmProvider> = match backend.as_str() {
        "openai" => Arc::new(OpenAiProvider::new(model, config)?),
        "anthropic" => Arc::new(AnthropicProvider::new(model, config)?),
        "ollama" => Arc::new(OllamaProvider::new(model, config)?),
        _ => return Err(ProviderError::UnknownBackend { name: backend }),
    };
    tracing::debug!(backend = %backend, model = %provider.model_name(), "provider ready");
    Ok(provider)
}
