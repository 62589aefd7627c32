//! probe core library
//!
//! Behavioral property testing for text-generation models: perturb an input,
//! re-query the model, and check that the outputs relate the way the
//! perturbation predicts.

pub mod comparator;
pub mod error;
pub mod inputs;
pub mod metrics;
pub mod models;
pub mod obs;
pub mod property;
pub mod provider;
pub mod reporting;
pub mod runner;
pub mod telemetry;
pub mod transform;

pub use comparator::{
    l2_normalize, normalize_text, Comparator, ComparatorKind, ContainsMatch, Embedder,
    EmbedderLoader, EmbeddingSimilarity, ExactMatch, ExtractFn, HashEmbedder,
};

pub use error::{ProbeError, Result};

pub use inputs::{load_inputs, parse_inputs, STARTER_INPUTS};

pub use models::{Evaluation, ProbeResult, SuiteResult, Verdict};

pub use property::{
    describe, get_property, AggregationPolicy, Consistency, Invariance, NegationCoherence,
    Property, PropertyConfig, PropertyKind, PropertyOptions, Robustness, PROPERTY_NAMES,
};

pub use provider::{LlmProvider, DEFAULT_TEMPERATURE};

pub use reporting::{
    compare_suites, render_comparison, render_summary, write_suite_json, SuiteComparison,
    SuiteExport, Winner,
};

pub use runner::{RunnerConfig, SuiteRunner};

pub use transform::{
    parse_numbered_lines, EntitySwapTransform, NegationTransform, ParaphraseTransform,
    Transform, TransformKind, TypoTransform,
};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
