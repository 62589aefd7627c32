//! Suite export artifact, text summaries and two-model comparison.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{round_dp, SuiteResult, Verdict};

/// Inputs longer than this are cut in the export.
pub const EXPORT_INPUT_CHARS: usize = 80;

/// Mean-score lead a model needs over the other to win a property.
pub const WIN_MARGIN: f64 = 0.02;

/// One result row of the export artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeExport {
    pub input: String,
    pub property: String,
    pub verdict: Verdict,
    pub score: f64,
    pub details: Map<String, Value>,
}

/// JSON artifact written by `probe run --output`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteExport {
    pub model: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub pass_rate: f64,
    pub elapsed_ms: f64,
    pub results: Vec<ProbeExport>,
}

impl SuiteExport {
    pub fn from_suite(suite: &SuiteResult) -> Self {
        Self {
            model: suite.model_name.clone(),
            total: suite.total(),
            passed: suite.passed(),
            failed: suite.failed(),
            errors: suite.errors(),
            pass_rate: round_dp(suite.pass_rate(), 4),
            elapsed_ms: round_dp(suite.total_elapsed_ms, 1),
            results: suite
                .results
                .iter()
                .map(|r| ProbeExport {
                    input: truncate_chars(r.input(), EXPORT_INPUT_CHARS),
                    property: r.property_name().to_string(),
                    verdict: r.verdict(),
                    score: round_dp(r.score(), 4),
                    details: r.details().clone(),
                })
                .collect(),
        }
    }
}

/// Write the suite export as pretty JSON.
pub fn write_suite_json(path: &Path, suite: &SuiteResult) -> Result<()> {
    let content = serde_json::to_string_pretty(&SuiteExport::from_suite(suite))?;
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), "suite export written");
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}…", truncate_chars(text, max))
    } else {
        text.to_string()
    }
}

/// Plain-text report: status line, counts, one row per result, then the
/// details of every non-passing result.
pub fn render_summary(suite: &SuiteResult) -> String {
    let mut out = String::new();
    let status = if suite.failed() == 0 && suite.errors() == 0 {
        "ALL PASSED"
    } else {
        "FAILURES DETECTED"
    };

    let _ = writeln!(out, "probe - {}", suite.model_name);
    let _ = writeln!(out, "{status}");
    let _ = writeln!(
        out,
        "  Total: {}  Passed: {}  Failed: {}  Errors: {}  Pass Rate: {:.1}%  Time: {:.0}ms",
        suite.total(),
        suite.passed(),
        suite.failed(),
        suite.errors(),
        suite.pass_rate() * 100.0,
        suite.total_elapsed_ms
    );
    out.push('\n');

    let _ = writeln!(out, "  {:<7} {:<51} {:<20} {:>6}", "VERDICT", "INPUT", "PROPERTY", "SCORE");
    for r in &suite.results {
        let _ = writeln!(
            out,
            "  {:<7} {:<51} {:<20} {:>6.2}",
            r.verdict().as_str().to_uppercase(),
            ellipsize(r.input(), 50),
            r.property_name(),
            r.score()
        );
    }

    let failures = suite.failures();
    if !failures.is_empty() {
        let _ = writeln!(out, "\n-- Failure Details ({}) --\n", failures.len());
        for r in failures {
            let _ = writeln!(
                out,
                "  x {} on: {}",
                r.property_name(),
                truncate_chars(r.input(), 60)
            );
            let threshold = r
                .details()
                .get("threshold")
                .map(Value::to_string)
                .unwrap_or_else(|| "?".to_string());
            let _ = writeln!(out, "    Score: {:.3} (threshold: {threshold})", r.score());
            if let Some(err) = r.error_message() {
                let _ = writeln!(out, "    Error: {err}");
            }
            if !r.original_output().is_empty() {
                let _ = writeln!(out, "    Original: {}", truncate_chars(r.original_output(), 100));
            }
            for (i, v) in r.variant_outputs().iter().take(3).enumerate() {
                let _ = writeln!(out, "    Variant {}: {}", i + 1, truncate_chars(v, 100));
            }
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    fn by_margin(a: f64, b: f64, margin: f64) -> Self {
        if a > b + margin {
            Winner::A
        } else if b > a + margin {
            Winner::B
        } else {
            Winner::Tie
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Winner::A => "<- A",
            Winner::B => "B ->",
            Winner::Tie => "Tie",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyComparison {
    pub property: String,
    pub mean_a: f64,
    pub mean_b: f64,
    pub a_meets_threshold: bool,
    pub b_meets_threshold: bool,
    pub winner: Winner,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteComparison {
    pub model_a: String,
    pub model_b: String,
    pub threshold: f64,
    pub properties: Vec<PropertyComparison>,
    pub pass_rate_a: f64,
    pub pass_rate_b: f64,
    pub overall: Winner,
}

fn mean_score(suite: &SuiteResult, property: &str) -> f64 {
    let scores: Vec<f64> = suite.for_property(property).map(|r| r.score()).collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Compare two suites property by property.
///
/// `property_names` are result names (`negation_coherence`, not `negation`).
/// A model wins a property when its mean score leads by more than
/// [`WIN_MARGIN`]; the overall winner is whichever pass rate is higher.
pub fn compare_suites(
    a: &SuiteResult,
    b: &SuiteResult,
    property_names: &[&str],
    threshold: f64,
) -> SuiteComparison {
    let properties = property_names
        .iter()
        .map(|name| {
            let mean_a = mean_score(a, name);
            let mean_b = mean_score(b, name);
            PropertyComparison {
                property: name.to_string(),
                mean_a,
                mean_b,
                a_meets_threshold: mean_a >= threshold,
                b_meets_threshold: mean_b >= threshold,
                winner: Winner::by_margin(mean_a, mean_b, WIN_MARGIN),
            }
        })
        .collect();

    SuiteComparison {
        model_a: a.model_name.clone(),
        model_b: b.model_name.clone(),
        threshold,
        properties,
        pass_rate_a: a.pass_rate(),
        pass_rate_b: b.pass_rate(),
        overall: Winner::by_margin(a.pass_rate(), b.pass_rate(), 0.0),
    }
}

pub fn render_comparison(cmp: &SuiteComparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model Comparison");
    let _ = writeln!(
        out,
        "  {:<20} {:>20} {:>20} {:>8}",
        "PROPERTY", cmp.model_a, cmp.model_b, "WINNER"
    );
    for row in &cmp.properties {
        let _ = writeln!(
            out,
            "  {:<20} {:>20.3} {:>20.3} {:>8}",
            row.property,
            row.mean_a,
            row.mean_b,
            row.winner.label()
        );
    }
    let _ = writeln!(
        out,
        "  {:<20} {:>19.1}% {:>19.1}% {:>8}",
        "Overall",
        cmp.pass_rate_a * 100.0,
        cmp.pass_rate_b * 100.0,
        cmp.overall.label()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evaluation, ProbeResult};

    fn scored(input: &str, property: &str, passed: bool, score: f64) -> ProbeResult {
        ProbeResult::scored(
            input,
            property,
            Evaluation {
                passed,
                score,
                threshold: 0.8,
                original_output: "Paris".to_string(),
                variant_outputs: vec!["Paris".into(), "Lyon".into(), "Paris!".into(), "Nice".into()],
                ..Default::default()
            },
            3.0,
        )
    }

    fn suite(model: &str, results: Vec<ProbeResult>) -> SuiteResult {
        SuiteResult::new(results, model, 1234.56)
    }

    #[test]
    fn test_export_truncates_and_rounds() {
        let long = "x".repeat(120);
        let s = suite(
            "mock",
            vec![
                scored(&long, "consistency", true, 0.912345),
                ProbeResult::error("q", "robustness", "timeout"),
                scored("q", "invariance", false, 0.5),
            ],
        );
        let export = SuiteExport::from_suite(&s);

        assert_eq!(export.model, "mock");
        assert_eq!((export.total, export.passed, export.failed, export.errors), (3, 1, 1, 1));
        assert_eq!(export.pass_rate, 0.3333);
        assert_eq!(export.elapsed_ms, 1234.6);
        assert_eq!(export.results[0].input.len(), 80);
        assert_eq!(export.results[0].score, 0.9123);
        assert_eq!(export.results[1].verdict, Verdict::Error);
        assert_eq!(export.results[1].details["error"], "timeout");
    }

    #[test]
    fn test_write_suite_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let s = suite("mock", vec![scored("q", "consistency", true, 1.0)]);

        write_suite_json(&path, &s).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["model"], "mock");
        assert_eq!(value["results"][0]["verdict"], "pass");
        assert_eq!(value["results"][0]["property"], "consistency");
        assert_eq!(value["results"][0]["details"]["threshold"], 0.8);
    }

    #[test]
    fn test_summary_lists_failures_with_three_variants() {
        let s = suite(
            "mock",
            vec![scored("ok", "consistency", true, 0.9), scored("bad", "invariance", false, 0.4)],
        );
        let text = render_summary(&s);

        assert!(text.contains("FAILURES DETECTED"));
        assert!(text.contains("Failure Details (1)"));
        assert!(text.contains("invariance on: bad"));
        assert!(text.contains("Variant 3: Paris!"));
        assert!(!text.contains("Variant 4"));
    }

    #[test]
    fn test_summary_all_passed() {
        let s = suite("mock", vec![scored("ok", "consistency", true, 0.9)]);
        let text = render_summary(&s);
        assert!(text.contains("ALL PASSED"));
        assert!(!text.contains("Failure Details"));
    }

    #[test]
    fn test_compare_uses_margin() {
        let a = suite(
            "model-a",
            vec![
                scored("q1", "consistency", true, 0.90),
                scored("q1", "robustness", true, 0.85),
                scored("q1", "invariance", true, 0.95),
            ],
        );
        let b = suite(
            "model-b",
            vec![
                scored("q1", "consistency", true, 0.89),
                scored("q1", "robustness", true, 0.95),
                scored("q1", "invariance", false, 0.60),
            ],
        );
        let cmp = compare_suites(&a, &b, &["consistency", "robustness", "invariance"], 0.8);

        let winners: Vec<Winner> = cmp.properties.iter().map(|p| p.winner).collect();
        assert_eq!(winners, vec![Winner::Tie, Winner::B, Winner::A]);
        assert!(!cmp.properties[2].b_meets_threshold);
        assert_eq!(cmp.overall, Winner::A);

        let text = render_comparison(&cmp);
        assert!(text.contains("model-a"));
        assert!(text.contains("<- A"));
    }

    #[test]
    fn test_compare_missing_property_scores_zero() {
        let a = suite("a", vec![]);
        let b = suite("b", vec![]);
        let cmp = compare_suites(&a, &b, &["negation_coherence"], 0.7);
        assert_eq!(cmp.properties[0].mean_a, 0.0);
        assert_eq!(cmp.properties[0].winner, Winner::Tie);
        assert_eq!(cmp.overall, Winner::Tie);
    }
}
