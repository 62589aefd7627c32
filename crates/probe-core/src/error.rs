//! Error taxonomy for probe.

/// Errors produced while configuring or evaluating behavioral properties.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("transform error: {0}")]
    Transform(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("scoring error: {0}")]
    Scoring(String),

    #[error("unknown property: {name}. Available: {}", available.join(", "))]
    UnknownProperty {
        name: String,
        available: Vec<String>,
    },

    #[error("unknown comparator: {name}. Available: {}", available.join(", "))]
    UnknownComparator {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;
