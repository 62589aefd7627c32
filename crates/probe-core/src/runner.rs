//! Suite runner: fan the (input × property) cross product out over a bounded
//! number of concurrent evaluations.
//!
//! Every task is isolated. An `Err` from [`Property::test`] or a panic inside
//! it becomes an `Error` result for that task alone, so one failing provider
//! call never aborts the suite. Results come back in submission order
//! (input-major, then property), whatever order the tasks finish in.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{warn, Instrument};

use crate::metrics::METRICS;
use crate::models::{ProbeResult, SuiteResult, Verdict};
use crate::obs::{self, SuiteSpan};
use crate::property::Property;
use crate::provider::LlmProvider;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Maximum number of property tests in flight at once.
    pub concurrency: usize,
}

impl RunnerConfig {
    pub const DEFAULT_CONCURRENCY: usize = 5;
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteRunner {
    config: RunnerConfig,
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl SuiteRunner {
    pub fn new(mut config: RunnerConfig) -> Self {
        if config.concurrency == 0 {
            warn!("concurrency 0 would never admit a task; using 1");
            config.concurrency = 1;
        }
        Self { config }
    }

    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    /// Evaluate every property on every input.
    ///
    /// Never fails: task failures are folded into `Error` results.
    pub async fn run(
        &self,
        provider: Arc<dyn LlmProvider>,
        inputs: &[String],
        properties: &[Arc<dyn Property>],
    ) -> SuiteResult {
        let model_name = provider.model_name().to_string();
        let suite_span = SuiteSpan::new(&model_name);
        {
            let _guard = suite_span.enter();
            obs::emit_suite_started(&model_name, inputs.len(), properties.len(), self.config.concurrency);
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut join_set = JoinSet::new();

        let tasks = inputs
            .iter()
            .flat_map(|input| properties.iter().map(move |property| (input, property)));
        for (idx, (input, property)) in tasks.enumerate() {
            let input = input.clone();
            let property = Arc::clone(property);
            let provider = Arc::clone(&provider);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = evaluate(property.as_ref(), &input, provider.as_ref()).await;
                    (idx, result)
                }
                .instrument(suite_span.span().clone()),
            );
        }

        let total = inputs.len() * properties.len();
        let mut slots: Vec<Option<ProbeResult>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "evaluation task did not complete"),
            }
        }

        // A slot is only empty if its task was cancelled before reporting.
        let pairs = inputs
            .iter()
            .flat_map(|input| properties.iter().map(move |property| (input, property)));
        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(pairs)
            .map(|(slot, (input, property))| {
                slot.unwrap_or_else(|| {
                    METRICS.inc_probes_errored();
                    ProbeResult::error(input, property.name(), "evaluation task aborted")
                })
            })
            .collect();

        let suite = SuiteResult::new(results, &model_name, start.elapsed().as_secs_f64() * 1000.0);
        {
            let _guard = suite_span.enter();
            obs::emit_suite_finished(&suite);
        }
        suite
    }
}

/// Run one property test, converting errors and panics into `Error` results.
async fn evaluate(property: &dyn Property, input: &str, provider: &dyn LlmProvider) -> ProbeResult {
    let start = Instant::now();
    let outcome = AssertUnwindSafe(property.test(input, provider))
        .catch_unwind()
        .await;
    METRICS.inc_probes_run();

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            obs::emit_probe_error(property.name(), input, &e);
            ProbeResult::error(input, property.name(), e.to_string())
        }
        Err(payload) => {
            let message = format!("evaluation task aborted: {}", panic_message(payload.as_ref()));
            obs::emit_probe_error(property.name(), input, &message);
            ProbeResult::error(input, property.name(), message)
        }
    };

    let result = if result.elapsed_ms() == 0.0 {
        result.with_elapsed_ms(start.elapsed().as_secs_f64() * 1000.0)
    } else {
        result
    };
    if result.verdict() == Verdict::Error {
        METRICS.inc_probes_errored();
    }
    obs::emit_probe_finished(&result);
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
