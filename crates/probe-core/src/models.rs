//! Result records passed between properties, the runner and reporting.
//!
//! - `Verdict`: terminal outcome of one evaluation
//! - `ProbeResult`: one (input, property) evaluation
//! - `SuiteResult`: every evaluation of a suite run, in submission order

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a single property evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Error => "error",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Round `value` to `places` decimal places.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Clamp a similarity score into `[0, 1]`; NaN becomes `0.0`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Scored outcome of a property's aggregation policy, before it is stamped
/// with the input, property name and timing.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub passed: bool,
    pub score: f64,
    pub threshold: f64,
    /// Property-specific diagnostics. `threshold` is always added on top.
    pub details: Map<String, Value>,
    pub original_output: String,
    pub variant_outputs: Vec<String>,
}

/// One evaluation outcome.
///
/// Built only through [`ProbeResult::error`] and [`ProbeResult::scored`]:
/// an `Error` verdict always carries score `0.0` and an `error` detail, a
/// `Pass`/`Fail` verdict always carries a `threshold` detail and a score in
/// `[0, 1]`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    input: String,
    property_name: String,
    verdict: Verdict,
    score: f64,
    details: Map<String, Value>,
    original_output: String,
    variant_outputs: Vec<String>,
    elapsed_ms: f64,
}

impl ProbeResult {
    /// An `Error` result carrying `message` under the `error` detail.
    pub fn error(input: &str, property_name: &str, message: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::String(message.into()));
        Self {
            input: input.to_string(),
            property_name: property_name.to_string(),
            verdict: Verdict::Error,
            score: 0.0,
            details,
            original_output: String::new(),
            variant_outputs: Vec::new(),
            elapsed_ms: 0.0,
        }
    }

    /// A `Pass` or `Fail` result from a completed evaluation.
    pub fn scored(input: &str, property_name: &str, eval: Evaluation, elapsed_ms: f64) -> Self {
        let mut details = eval.details;
        details.insert("threshold".to_string(), Value::from(eval.threshold));
        Self {
            input: input.to_string(),
            property_name: property_name.to_string(),
            verdict: if eval.passed {
                Verdict::Pass
            } else {
                Verdict::Fail
            },
            score: clamp_score(eval.score),
            details,
            original_output: eval.original_output,
            variant_outputs: eval.variant_outputs,
            elapsed_ms,
        }
    }

    /// Stamp the wall time spent producing this result.
    pub fn with_elapsed_ms(mut self, elapsed_ms: f64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn original_output(&self) -> &str {
        &self.original_output
    }

    pub fn variant_outputs(&self) -> &[String] {
        &self.variant_outputs
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// The `error` detail, if this is an `Error` result.
    pub fn error_message(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

/// Every evaluation of one suite run against one provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuiteResult {
    /// Results in input-then-property submission order.
    pub results: Vec<ProbeResult>,
    /// Display name of the provider's model.
    pub model_name: String,
    /// Wall-clock time for the whole batch.
    pub total_elapsed_ms: f64,
}

impl SuiteResult {
    pub fn new(results: Vec<ProbeResult>, model_name: &str, total_elapsed_ms: f64) -> Self {
        Self {
            results,
            model_name: model_name.to_string(),
            total_elapsed_ms,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.count(Verdict::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::Fail)
    }

    pub fn errors(&self) -> usize {
        self.count(Verdict::Error)
    }

    /// `passed / total`, or `0.0` for an empty suite.
    pub fn pass_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.passed() as f64 / self.total() as f64
        }
    }

    /// Every result that did not pass, errors included.
    pub fn failures(&self) -> Vec<&ProbeResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }

    /// Results belonging to one property.
    pub fn for_property<'a>(&'a self, property_name: &'a str) -> impl Iterator<Item = &'a ProbeResult> {
        self.results
            .iter()
            .filter(move |r| r.property_name == property_name)
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(passed: bool, score: f64) -> ProbeResult {
        ProbeResult::scored(
            "What is the capital of France?",
            "consistency",
            Evaluation {
                passed,
                score,
                threshold: 0.8,
                ..Default::default()
            },
            12.5,
        )
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"pass\"");
        assert_eq!(serde_json::to_string(&Verdict::Error).unwrap(), "\"error\"");
        assert_eq!(Verdict::Fail.to_string(), "fail");
    }

    #[test]
    fn test_error_result_has_zero_score_and_message() {
        let result = ProbeResult::error("hi", "robustness", "timeout");
        assert_eq!(result.verdict(), Verdict::Error);
        assert_eq!(result.score(), 0.0);
        assert_eq!(result.error_message(), Some("timeout"));
        assert!(!result.passed());
    }

    #[test]
    fn test_scored_result_records_threshold_and_clamps() {
        let result = scored(true, 1.3);
        assert_eq!(result.verdict(), Verdict::Pass);
        assert_eq!(result.score(), 1.0);
        assert_eq!(result.details()["threshold"], serde_json::json!(0.8));
        assert_eq!(result.elapsed_ms(), 12.5);

        let nan = scored(false, f64::NAN);
        assert_eq!(nan.verdict(), Verdict::Fail);
        assert_eq!(nan.score(), 0.0);
    }

    #[test]
    fn test_suite_counts_and_pass_rate() {
        let suite = SuiteResult::new(
            vec![
                scored(true, 0.9),
                scored(true, 0.95),
                scored(false, 0.4),
                ProbeResult::error("x", "consistency", "boom"),
            ],
            "gpt-4o-mini",
            100.0,
        );
        assert_eq!(suite.total(), 4);
        assert_eq!(suite.passed(), 2);
        assert_eq!(suite.failed(), 1);
        assert_eq!(suite.errors(), 1);
        assert_eq!(suite.passed() + suite.failed() + suite.errors(), suite.total());
        assert_eq!(suite.pass_rate(), 0.5);
        assert_eq!(suite.failures().len(), 2);
    }

    #[test]
    fn test_empty_suite_pass_rate_is_zero() {
        let suite = SuiteResult::new(vec![], "m", 0.0);
        assert_eq!(suite.pass_rate(), 0.0);
        assert!(suite.failures().is_empty());
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(0.123456, 4), 0.1235);
        assert_eq!(round_dp(12.34, 1), 12.3);
    }
}
