//! Process-wide probe counters.
//!
//! The suite runner counts evaluations and the provider backends count model
//! calls. [`Metrics::flush`] logs a [`MetricsSnapshot`] once, when a run ends.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every runner and provider in the process.
pub static METRICS: Metrics = Metrics::new();

/// Relaxed atomic counters.
pub struct Metrics {
    probes_run: AtomicU64,
    probes_errored: AtomicU64,
    provider_calls: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub probes_run: u64,
    pub probes_errored: u64,
    pub provider_calls: u64,
}

impl MetricsSnapshot {
    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            probes_run: self.probes_run.saturating_sub(earlier.probes_run),
            probes_errored: self.probes_errored.saturating_sub(earlier.probes_errored),
            provider_calls: self.provider_calls.saturating_sub(earlier.provider_calls),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            probes_run: AtomicU64::new(0),
            probes_errored: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
        }
    }

    /// Count one finished (input, property) evaluation, whatever its verdict.
    pub fn inc_probes_run(&self) {
        self.probes_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one evaluation that ended with an ERROR verdict.
    pub fn inc_probes_errored(&self) {
        self.probes_errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `n` model requests. A batch counts once per prompt.
    pub fn add_provider_calls(&self, n: u64) {
        self.provider_calls.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "provider_calls", n, "counter incremented");
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            probes_run: self.probes_run(),
            probes_errored: self.probes_errored(),
            provider_calls: self.provider_calls(),
        }
    }

    /// Log the current snapshot as one `info!` event with `metric = "flush"`.
    pub fn flush(&self) {
        let snap = self.snapshot();
        tracing::info!(
            metric = "flush",
            probes_run = snap.probes_run,
            probes_errored = snap.probes_errored,
            provider_calls = snap.provider_calls,
        );
    }

    /// Evaluations finished so far.
    pub fn probes_run(&self) -> u64 {
        self.probes_run.load(Ordering::Relaxed)
    }

    /// Evaluations that ended in ERROR so far.
    pub fn probes_errored(&self) -> u64 {
        self.probes_errored.load(Ordering::Relaxed)
    }

    /// Model requests sent so far.
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.probes_run.store(0, Ordering::Relaxed);
        self.probes_errored.store(0, Ordering::Relaxed);
        self.provider_calls.store(0, Ordering::Relaxed);
    }
}
