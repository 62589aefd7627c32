//! Negation coherence: negating the input should change the answer.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::comparator::Comparator;
use crate::error::Result;
use crate::models::{round_dp, Evaluation, ProbeResult};
use crate::property::{elapsed_ms, observe, rounded_scores, AggregationPolicy, Property, PropertyConfig};
use crate::provider::LlmProvider;
use crate::transform::NegationTransform;

/// Passes when the output for the negated input diverges from the original
/// output by at least the threshold. Score is the divergence.
pub struct NegationCoherence {
    config: PropertyConfig,
    comparator: Arc<dyn Comparator>,
}

impl NegationCoherence {
    pub const NAME: &'static str = "negation_coherence";
    pub const DEFAULT_THRESHOLD: f64 = 0.7;

    pub fn new(config: PropertyConfig) -> Self {
        Self {
            comparator: config.comparator.build(None),
            config,
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }
}

impl Default for NegationCoherence {
    fn default() -> Self {
        Self::new(PropertyConfig {
            threshold: Self::DEFAULT_THRESHOLD,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Property for NegationCoherence {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn config(&self) -> &PropertyConfig {
        &self.config
    }

    fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::DivergenceAboveThreshold
    }

    async fn test(&self, input: &str, provider: &dyn LlmProvider) -> Result<ProbeResult> {
        let start = Instant::now();
        let Some(obs) = observe(&NegationTransform, self.comparator.as_ref(), input, provider).await?
        else {
            return Ok(ProbeResult::error(input, Self::NAME, "Negation transform failed")
                .with_elapsed_ms(elapsed_ms(start)));
        };

        let outcome = self.policy().apply(&obs.scores, self.config.threshold);

        let mut details = Map::new();
        details.insert("pairwise_scores".to_string(), rounded_scores(&obs.scores));
        details.insert(
            "similarity".to_string(),
            Value::from(round_dp(outcome.mean_similarity, 4)),
        );
        details.insert("divergence".to_string(), Value::from(round_dp(outcome.score, 4)));
        details.insert(
            "negated_input".to_string(),
            Value::from(obs.variants.into_iter().next().unwrap_or_default()),
        );

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
