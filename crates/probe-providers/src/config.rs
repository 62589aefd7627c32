//! Shared backend configuration and HTTP plumbing.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};

/// Connection settings shared by every backend.
///
/// Unset fields fall back to each backend's environment variables and
/// built-in defaults.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Completion length cap sent to chat backends.
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout: Self::DEFAULT_TIMEOUT,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}

/// Explicit value, else the environment variable, else `default`.
pub(crate) fn resolve(explicit: Option<&str>, env_var: &str, default: &str) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Explicit key, else the environment variable; empty counts as missing.
pub(crate) fn resolve_api_key(
    explicit: Option<&str>,
    backend: &'static str,
    env_var: &'static str,
) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or(ProviderError::MissingApiKey { backend, env_var })
}

pub(crate) fn build_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("probe/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout)
        .build()?)
}

/// Send `request` and decode a success body as `T`; non-2xx becomes
/// [`ProviderError::Status`] carrying the response text.
pub(crate) async fn send_json<T: DeserializeOwned>(
    backend: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            backend,
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        backend,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_explicit_and_trims_slash() {
        assert_eq!(
            resolve(Some("http://gpu-box:11434/"), "PROBE_TEST_UNSET_VAR", "http://localhost:11434"),
            "http://gpu-box:11434"
        );
        assert_eq!(
            resolve(None, "PROBE_TEST_UNSET_VAR", "http://localhost:11434"),
            "http://localhost:11434"
        );
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let err = resolve_api_key(Some("  "), "openai", "PROBE_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { env_var: "PROBE_TEST_UNSET_KEY", .. }));
        assert_eq!(
            resolve_api_key(Some("sk-test"), "openai", "PROBE_TEST_UNSET_KEY").unwrap(),
            "sk-test"
        );
    }

    #[test]
    fn test_default_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_tokens, 1024);
        assert!(config.api_key.is_none());
    }
}
