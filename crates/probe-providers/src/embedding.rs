//! OpenAI-compatible `/embeddings` client for the embedding comparator.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use probe_core::{Embedder, EmbedderLoader, ProbeError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{build_client, resolve, send_json, ProviderConfig};
use crate::error::{ProviderError, Result};
use crate::openai;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in request order; rows may arrive in any order.
    pub(crate) fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(ProviderError::InvalidResponse {
                backend: "embeddings",
                detail: format!("{} vectors for {expected} inputs", self.data.len()),
            });
        }
        self.data.sort_by_key(|row| row.index);
        Ok(self.data.into_iter().map(|row| row.embedding).collect())
    }
}

pub struct HttpEmbedder {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbedder {
    /// Base URL and key default to the OpenAI settings; the key is optional so
    /// local embedding servers work without one.
    pub fn new(model: Option<&str>, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            model: model.unwrap_or(DEFAULT_EMBEDDING_MODEL).to_string(),
            base_url: resolve(
                config.base_url.as_deref(),
                openai::BASE_URL_ENV,
                openai::DEFAULT_BASE_URL,
            ),
            api_key: config
                .api_key
                .clone()
                .or_else(|| std::env::var(openai::API_KEY_ENV).ok())
                .filter(|k| !k.trim().is_empty()),
            client: build_client(config)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Loader for [`probe_core::EmbeddingSimilarity`]; the client is built on
    /// first use.
    pub fn loader(model: Option<String>, config: ProviderConfig) -> EmbedderLoader {
        Arc::new(move || -> BoxFuture<'static, probe_core::Result<Arc<dyn Embedder>>> {
            let model = model.clone();
            let config = config.clone();
            Box::pin(async move {
                let embedder = HttpEmbedder::new(model.as_deref(), &config)
                    .map_err(|e| ProbeError::Embedding(e.to_string()))?;
                debug!(model = %embedder.model, url = %embedder.base_url, "http embedder ready");
                Ok(Arc::new(embedder) as Arc<dyn Embedder>)
            })
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response: EmbeddingResponse = send_json("embeddings", request).await?;
        response.into_vectors(texts.len())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> probe_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
            .await
            .map_err(|e| ProbeError::Embedding(e.to_string()))
    }
}
