//! Invariance: swapping irrelevant entities should not change the substance
//! of the answer.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::comparator::Comparator;
use crate::error::Result;
use crate::models::{Evaluation, ProbeResult};
use crate::property::{elapsed_ms, observe, rounded_scores, AggregationPolicy, Property, PropertyConfig};
use crate::provider::LlmProvider;
use crate::transform::EntitySwapTransform;

pub struct Invariance {
    config: PropertyConfig,
    transform: EntitySwapTransform,
    comparator: Arc<dyn Comparator>,
}

impl Invariance {
    pub const NAME: &'static str = "invariance";
    pub const DEFAULT_THRESHOLD: f64 = 0.8;

    pub fn new(n_variants: usize, config: PropertyConfig) -> Self {
        Self {
            comparator: config.comparator.build(None),
            config,
            transform: EntitySwapTransform::new(n_variants),
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }
}

impl Default for Invariance {
    fn default() -> Self {
        Self::new(
            EntitySwapTransform::DEFAULT_N,
            PropertyConfig {
                threshold: Self::DEFAULT_THRESHOLD,
                ..Default::default()
            },
        )
    }
}

#[async_trait]
impl Property for Invariance {
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
            return Ok(
                ProbeResult::error(input, Self::NAME, "No entity-swap variants generated")
                    .with_elapsed_ms(elapsed_ms(start)),
            );
        };

        let outcome = self.policy().apply(&obs.scores, self.config.threshold);

        let mut details = Map::new();
        details.insert("pairwise_scores".to_string(), rounded_scores(&obs.scores));
        details.insert("entity_variants".to_string(), Value::from(obs.variants));

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
