//! Error types for probe-providers

use probe_core::ProbeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("unknown provider: {name}. Use openai, anthropic, or ollama")]
    UnknownBackend { name: String },

    #[error("{backend} requires an API key (set {env_var})")]
    MissingApiKey {
        backend: &'static str,
        env_var: &'static str,
    },

    /// Transport-level failure: connect, timeout, body read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("{backend} returned HTTP {status}: {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected {backend} response: {detail}")]
    InvalidResponse {
        backend: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

impl From<ProviderError> for ProbeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UnknownBackend { .. } | ProviderError::MissingApiKey { .. } => {
                ProbeError::InvalidConfig(err.to_string())
            }
            other => ProbeError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_maps_to_provider_error() {
        let err: ProbeError = ProviderError::Status {
            backend: "openai",
            status: 429,
            body: "rate limited".to_string(),
        }
        .into();
        assert!(matches!(err, ProbeError::Provider(_)));
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn test_configuration_errors_map_to_invalid_config() {
        let err: ProbeError = ProviderError::UnknownBackend {
            name: "cohere".to_string(),
        }
        .into();
        assert!(matches!(err, ProbeError::InvalidConfig(_)));
        assert!(err.to_string().contains("openai, anthropic, or ollama"));
    }
}
