//! Model provider capability consumed by transforms, properties and the runner.
//!
//! Concrete HTTP backends live in the `probe-providers` crate; tests plug in
//! scripted in-memory providers.

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::Result;

/// Sampling temperature used for every probe request.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// A text-generation model reachable by the core.
///
/// Implementations must be safe for concurrent invocation: the runner calls
/// the same provider from many tasks at once.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Display name of the model (stamped on suite results).
    fn model_name(&self) -> &str;

    /// Generate a completion for a single prompt.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Generate completions for many prompts.
    ///
    /// Output is order-preserving and has the same length as `prompts`. The
    /// default fans out to [`LlmProvider::generate`] concurrently.
    async fn generate_batch(&self, prompts: &[String], temperature: f32) -> Result<Vec<String>> {
        try_join_all(prompts.iter().map(|p| self.generate(p, temperature))).await
    }
}
