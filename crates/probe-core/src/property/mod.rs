//! Behavioral properties.
//!
//! A property wires one [`Transform`] and one [`Comparator`] to an
//! [`AggregationPolicy`] and evaluates a single input against a provider:
//!
//! | Property | Transform | Policy |
//! |---|---|---|
//! | [`Consistency`] | paraphrase | [`AggregationPolicy::FractionAboveThreshold`] |
//! | [`Invariance`] | entity swap | [`AggregationPolicy::MeanAboveThreshold`] |
//! | [`NegationCoherence`] | negation | [`AggregationPolicy::DivergenceAboveThreshold`] |
//! | [`Robustness`] | typo | [`AggregationPolicy::MeanAboveThreshold`] |

pub mod consistency;
pub mod invariance;
pub mod negation;
pub mod registry;
pub mod robustness;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::comparator::{Comparator, ComparatorKind};
use crate::error::{ProbeError, Result};
use crate::models::{clamp_score, round_dp, ProbeResult};
use crate::provider::{LlmProvider, DEFAULT_TEMPERATURE};
use crate::transform::Transform;

pub use consistency::Consistency;
pub use invariance::Invariance;
pub use negation::NegationCoherence;
pub use registry::{describe, get_property, PropertyKind, PropertyOptions, PROPERTY_NAMES};
pub use robustness::Robustness;

/// Per-property configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PropertyConfig {
    /// Pass threshold. Minimum similarity for most properties, minimum
    /// divergence for negation coherence.
    pub threshold: f64,

    /// Comparator used to score variant outputs against the original.
    pub comparator: ComparatorKind,
}

impl PropertyConfig {
    pub fn new(threshold: f64, comparator: ComparatorKind) -> Self {
        Self {
            threshold,
            comparator,
        }
    }
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            comparator: ComparatorKind::Embedding,
        }
    }
}

/// A behavioral property evaluated per input.
#[async_trait]
pub trait Property: Send + Sync {
    /// Name stamped on every result of this property.
    fn name(&self) -> &'static str;

    fn config(&self) -> &PropertyConfig;

    fn policy(&self) -> AggregationPolicy;

    /// Evaluate `input` against `provider`.
    ///
    /// A transform that yields no variants produces an `Error` result.
    /// Provider and transform failures are returned as `Err`.
    async fn test(&self, input: &str, provider: &dyn LlmProvider) -> Result<ProbeResult>;
}

/// How per-variant similarity scores become a verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// The fraction of variants scoring at least the threshold must itself be
    /// at least the threshold. Score is the mean similarity.
    FractionAboveThreshold,

    /// The mean similarity must be at least the threshold. Score is the mean.
    MeanAboveThreshold,

    /// `1 - similarity` must be at least the threshold. Score is the divergence.
    DivergenceAboveThreshold,
}

/// Result of applying an [`AggregationPolicy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyOutcome {
    pub passed: bool,
    pub score: f64,
    pub mean_similarity: f64,
    pub pass_fraction: f64,
}

impl AggregationPolicy {
    pub fn apply(&self, scores: &[f64], threshold: f64) -> PolicyOutcome {
        let mean_similarity = mean(scores);
        let pass_fraction = if scores.is_empty() {
            0.0
        } else {
            scores.iter().filter(|s| **s >= threshold).count() as f64 / scores.len() as f64
        };

        let (passed, score) = match self {
            AggregationPolicy::FractionAboveThreshold => {
                (pass_fraction >= threshold, mean_similarity)
            }
            AggregationPolicy::MeanAboveThreshold => (mean_similarity >= threshold, mean_similarity),
            AggregationPolicy::DivergenceAboveThreshold => {
                let divergence = 1.0 - mean_similarity;
                (divergence >= threshold, divergence)
            }
        };

        PolicyOutcome {
            passed,
            score,
            mean_similarity,
            pass_fraction,
        }
    }
}

fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Everything observed while probing one input, before aggregation.
#[derive(Debug, Clone)]
pub(crate) struct Observation {
    pub original: String,
    pub variants: Vec<String>,
    pub outputs: Vec<String>,
    pub scores: Vec<f64>,
}

/// Run the shared probing protocol: original output, transform, variant
/// outputs, comparator scores.
///
/// Returns `Ok(None)` when the transform produced no variants.
pub(crate) async fn observe(
    transform: &dyn Transform,
    comparator: &dyn Comparator,
    input: &str,
    provider: &dyn LlmProvider,
) -> Result<Option<Observation>> {
    let original = provider.generate(input, DEFAULT_TEMPERATURE).await?;

    let variants = transform.apply(input, Some(provider)).await?;
    if variants.is_empty() {
        return Ok(None);
    }

    let outputs = provider.generate_batch(&variants, DEFAULT_TEMPERATURE).await?;
    if outputs.len() != variants.len() {
        return Err(ProbeError::Provider(format!(
            "generate_batch returned {} outputs for {} prompts",
            outputs.len(),
            variants.len()
        )));
    }

    let scores = comparator.batch_similarity(&original, &outputs).await?;
    if scores.len() != outputs.len() {
        return Err(ProbeError::Scoring(format!(
            "{} comparator returned {} scores for {} outputs",
            comparator.name(),
            scores.len(),
            outputs.len()
        )));
    }

    Ok(Some(Observation {
        original,
        variants,
        outputs,
        scores: scores.into_iter().map(clamp_score).collect(),
    }))
}

/// Scores rounded to 4 decimals for the `pairwise_scores` detail.
pub(crate) fn rounded_scores(scores: &[f64]) -> Value {
    Value::from(scores.iter().map(|s| round_dp(*s, 4)).collect::<Vec<_>>())
}

/// Elapsed milliseconds since `start`.
pub(crate) fn elapsed_ms(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider and fixed-score comparator shared by property tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::comparator::Comparator;
    use crate::error::{ProbeError, Result};
    use crate::provider::LlmProvider;

    /// Routes prompts: transform instructions get `transform_reply`, every
    /// other prompt pops the next answer from `answers` (or echoes).
    pub struct ScriptedProvider {
        pub transform_reply: String,
        pub answers: Mutex<VecDeque<String>>,
        pub fail_batch: bool,
    }

    impl ScriptedProvider {
        pub fn new(transform_reply: &str, answers: &[&str]) -> Self {
            Self {
                transform_reply: transform_reply.to_string(),
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                fail_batch: false,
            }
        }

        fn is_transform_prompt(prompt: &str) -> bool {
            prompt.starts_with("Rephrase the following")
                || prompt.starts_with("Take this text")
                || prompt.starts_with("Negate the following")
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
            if Self::is_transform_prompt(prompt) {
                return Ok(self.transform_reply.clone());
            }
            let next = self.answers.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| format!("answer to {prompt}")))
        }

        async fn generate_batch(&self, prompts: &[String], temperature: f32) -> Result<Vec<String>> {
            if self.fail_batch {
                return Err(ProbeError::Provider("batch endpoint unavailable".to_string()));
            }
            let mut out = Vec::new();
            for p in prompts {
                out.push(self.generate(p, temperature).await?);
            }
            Ok(out)
        }
    }

    /// Returns queued scores in order, regardless of the texts.
    pub struct FixedScores {
        pub scores: Mutex<VecDeque<f64>>,
    }

    impl FixedScores {
        pub fn new(scores: &[f64]) -> Self {
            Self {
                scores: Mutex::new(scores.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl Comparator for FixedScores {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn similarity(&self, _a: &str, _b: &str) -> Result<f64> {
            self.scores
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProbeError::Scoring("no scores left".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_policy_differs_from_mean_policy() {
        // Mean 0.85 clears a 0.8 mean threshold, but only 2/3 of variants
        // reach 0.8, which misses the same threshold as a fraction.
        let scores = [0.95, 0.9, 0.7];
        let fraction = AggregationPolicy::FractionAboveThreshold.apply(&scores, 0.8);
        let mean = AggregationPolicy::MeanAboveThreshold.apply(&scores, 0.8);

        assert!((fraction.score - 0.85).abs() < 1e-9);
        assert!((fraction.pass_fraction - 2.0 / 3.0).abs() < 1e-9);
        assert!(!fraction.passed);
        assert!(mean.passed);
    }

    #[test]
    fn test_divergence_policy_scores_one_minus_similarity() {
        let outcome = AggregationPolicy::DivergenceAboveThreshold.apply(&[0.3], 0.7);
        assert_eq!(outcome.score, 1.0 - 0.3);
        assert!(outcome.passed);

        let outcome = AggregationPolicy::DivergenceAboveThreshold.apply(&[0.9], 0.7);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_policy_on_empty_scores() {
        let outcome = AggregationPolicy::MeanAboveThreshold.apply(&[], 0.5);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.pass_fraction, 0.0);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_property_config_default() {
        let config = PropertyConfig::default();
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.comparator, ComparatorKind::Embedding);
    }
}
