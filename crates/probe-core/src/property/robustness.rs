//! Robustness: small typos in the input should not change the answer.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::comparator::Comparator;
use crate::error::Result;
use crate::models::{Evaluation, ProbeResult};
use crate::property::{elapsed_ms, observe, rounded_scores, AggregationPolicy, Property, PropertyConfig};
use crate::provider::LlmProvider;
use crate::transform::TypoTransform;

pub struct Robustness {
    config: PropertyConfig,
    transform: TypoTransform,
    comparator: Arc<dyn Comparator>,
}

impl Robustness {
    pub const NAME: &'static str = "robustness";
    pub const DEFAULT_THRESHOLD: f64 = 0.8;

    /// `seed` fixes the typo positions; `None` draws from OS entropy.
    pub fn new(n_variants: usize, seed: Option<u64>, config: PropertyConfig) -> Self {
        Self {
            comparator: config.comparator.build(None),
            config,
            transform: TypoTransform::new(n_variants, seed),
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }
}

impl Default for Robustness {
    fn default() -> Self {
        Self::new(
            TypoTransform::DEFAULT_N,
            None,
            PropertyConfig {
                threshold: Self::DEFAULT_THRESHOLD,
                ..Default::default()
            },
        )
    }
}

#[async_trait]
impl Property for Robustness {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn config(&self) -> &PropertyConfig {
        &self.config
    }

    fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::MeanAboveThreshold
    }

    async fn test(&self, input: &str, provider: &dyn LlmProvider) -> Result<ProbeResult> {
        let start = Instant::now();
        let Some(obs) = observe(&self.transform, self.comparator.as_ref(), input, provider).await?
        else {
            return Ok(ProbeResult::error(input, Self::NAME, "No typo variants generated")
                .with_elapsed_ms(elapsed_ms(start)));
        };

        let outcome = self.policy().apply(&obs.scores, self.config.threshold);

        let mut details = Map::new();
        details.insert("pairwise_scores".to_string(), rounded_scores(&obs.scores));
        details.insert("typo_inputs".to_string(), Value::from(obs.variants));

        Ok(ProbeResult::scored(
            input,
            Self::NAME,
            Evaluation {
                passed: outcome.passed,
                score: outcome.score,
                threshold: self.config.threshold,
                details,
                original_output: obs.original,
                variant_outputs: obs.outputs,
            },
            elapsed_ms(start),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::ContainsMatch;
    use crate::models::Verdict;
    use crate::property::testing::{FixedScores, ScriptedProvider};

    #[tokio::test]
    async fn test_robustness_records_typo_inputs() {
        let provider = ScriptedProvider::new("", &[]);
        let prop = Robustness::new(3, Some(42), PropertyConfig::default())
            .with_comparator(Arc::new(FixedScores::new(&[0.9, 0.85, 0.8])));
        let result = prop
            .test("Explain photosynthesis in 2 sentences.", &provider)
            .await
            .unwrap();

        assert_eq!(result.verdict(), Verdict::Pass);
        let typo_inputs = result.details()["typo_inputs"].as_array().unwrap();
        assert_eq!(typo_inputs.len(), 3);
        for (typo, output) in typo_inputs.iter().zip(result.variant_outputs()) {
            assert_eq!(output, &format!("answer to {}", typo.as_str().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_robustness_same_seed_same_variants() {
        let text = "What is the boiling point of water at sea level?";
        let mut seen = Vec::new();
        for _ in 0..2 {
            let provider = ScriptedProvider::new("", &[]);
            let prop = Robustness::new(3, Some(7), PropertyConfig::default())
                .with_comparator(Arc::new(FixedScores::new(&[1.0, 1.0, 1.0])));
            let result = prop.test(text, &provider).await.unwrap();
            seen.push(result.details()["typo_inputs"].clone());
        }
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_robustness_fails_below_mean_threshold() {
        let provider = ScriptedProvider::new("", &[]);
        let prop = Robustness::new(2, Some(1), PropertyConfig::default())
            .with_comparator(Arc::new(FixedScores::new(&[0.9, 0.5])));
        let result = prop.test("Name three primary colors.", &provider).await.unwrap();

        assert_eq!(result.verdict(), Verdict::Fail);
        assert!((result.score() - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_robustness_short_input_compares_unchanged_copies() {
        let provider = ScriptedProvider::new("", &["42", "42", "42"]);
        let prop = Robustness::new(2, Some(3), PropertyConfig::default())
            .with_comparator(Arc::new(ContainsMatch::new()));
        let result = prop.test("Hi?", &provider).await.unwrap();

        assert_eq!(result.verdict(), Verdict::Pass);
        assert_eq!(result.details()["typo_inputs"], serde_json::json!(["Hi?", "Hi?"]));
    }

    #[tokio::test]
    async fn test_robustness_zero_arity_is_an_error_result() {
        let provider = ScriptedProvider::new("", &["answer"]);
        let result = Robustness::new(0, Some(1), PropertyConfig::default())
            .test("Name three primary colors.", &provider)
            .await
            .unwrap();
        assert_eq!(result.verdict(), Verdict::Error);
    }

    #[test]
    fn test_robustness_defaults() {
        let prop = Robustness::default();
        assert_eq!(prop.name(), "robustness");
        assert_eq!(prop.config().threshold, 0.8);
        assert_eq!(prop.transform.n(), 3);
    }
}
