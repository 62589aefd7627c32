//! Structured lifecycle events for suite runs.
//!
//! [`SuiteSpan`] scopes everything logged during one run to the model under
//! test; the `emit_*` functions log one `info!`/`warn!` event each with a
//! stable `event` key so JSON log pipelines can filter on it.

use tracing::{info, warn};

use crate::models::{ProbeResult, SuiteResult};

/// The `probe.suite` span for one run, tagged with the model under test.
///
/// Attach it to spawned tasks with `tracing::Instrument`; [`SuiteSpan::enter`]
/// is for synchronous sections only, the guard must not live across `.await`.
pub struct SuiteSpan {
    span: tracing::Span,
}

impl SuiteSpan {
    pub fn new(model_name: &str) -> Self {
        Self {
            span: tracing::info_span!("probe.suite", model = %model_name),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

pub fn emit_suite_started(model_name: &str, inputs: usize, properties: usize, concurrency: usize) {
    info!(
        event = "suite.started",
        model = %model_name,
        inputs = inputs,
        properties = properties,
        tasks = inputs * properties,
        concurrency = concurrency,
    );
}

pub fn emit_probe_finished(result: &ProbeResult) {
    info!(
        event = "probe.finished",
        property = %result.property_name(),
        verdict = %result.verdict(),
        score = result.score(),
        elapsed_ms = result.elapsed_ms(),
    );
}

/// Warn-level: a property test raised instead of producing a verdict.
pub fn emit_probe_error(property_name: &str, input: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "probe.error",
        property = %property_name,
        input_chars = input.chars().count(),
        error = %error,
    );
}

pub fn emit_suite_finished(suite: &SuiteResult) {
    info!(
        event = "suite.finished",
        model = %suite.model_name,
        total = suite.total(),
        passed = suite.passed(),
        failed = suite.failed(),
        errors = suite.errors(),
        pass_rate = suite.pass_rate(),
        elapsed_ms = suite.total_elapsed_ms,
    );
}
