// SPDX-License-Identifier: MIT OR Apache-2.0
//! Thread-safe collection of per-dispatch timing/outcome metrics and
//! aggregate summaries.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Metrics captured for a single message dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchMetrics {
    /// The dispatched message's logical type.
    pub message_type: String,
    /// `"action"`, `"event"`, or `"query"`.
    pub kind: String,
    /// The result variant's tag (`"success"`, `"failure"`,
    /// `"authentication_failed"`, `"rate_limit_exceeded"`,
    /// `"input_validation_failed"`, `"cancelled"`).
    pub outcome: String,
    /// Wall-clock duration of the full middleware chain plus handler.
    pub duration_ms: u64,
    /// `1` if `outcome != "success"`, else `0`.
    pub errors_count: u64,
}

/// Aggregated statistics across multiple dispatches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of dispatches recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Error rate (non-success outcomes / total dispatches).
    pub error_rate: f64,
    /// Per-message-type dispatch counts (deterministic ordering).
    pub message_type_counts: BTreeMap<String, usize>,
    /// Per-outcome dispatch counts (deterministic ordering).
    pub outcome_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            error_rate: 0.0,
            message_type_counts: BTreeMap::new(),
            outcome_counts: BTreeMap::new(),
        }
    }
}

fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

/// Thread-safe collector for dispatch metrics.
///
/// Wrap in an `Arc` (or clone — the inner storage is already behind a
/// `Mutex`) to share across the middleware chain and any reporting task.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<DispatchMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Record a completed dispatch's metrics.
    pub fn record(&self, metrics: DispatchMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded dispatch metrics.
    #[must_use]
    pub fn dispatches(&self) -> Vec<DispatchMetrics> {
        self.inner.lock().expect("metrics lock poisoned").clone()
    }

    /// Number of dispatches recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no recorded dispatches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded dispatches.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|m| m.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let errors: u64 = data.iter().map(|m| m.errors_count).sum();
        let error_rate = errors as f64 / count as f64;

        let mut message_type_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
        for m in data.iter() {
            *message_type_counts.entry(m.message_type.clone()).or_insert(0) += 1;
            *outcome_counts.entry(m.outcome.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            error_rate,
            message_type_counts,
            outcome_counts,
        }
    }

    /// Clear all recorded metrics.
    pub fn clear(&self) {
        self.inner.lock().expect("metrics lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(message_type: &str, duration_ms: u64, outcome: &str) -> DispatchMetrics {
        DispatchMetrics {
            message_type: message_type.to_string(),
            kind: "action".to_string(),
            outcome: outcome.to_string(),
            duration_ms,
            errors_count: u64::from(outcome != "success"),
        }
    }

    #[test]
    fn empty_collector_summary_is_all_zero() {
        let c = MetricsCollector::new();
        let s = c.summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_duration_ms, 0.0);
        assert!(s.message_type_counts.is_empty());
    }

    #[test]
    fn records_and_aggregates_by_type_and_outcome() {
        let c = MetricsCollector::new();
        c.record(sample("OrderCreated", 10, "success"));
        c.record(sample("OrderCreated", 20, "failure"));
        c.record(sample("UserLoggedIn", 30, "success"));
        let s = c.summary();
        assert_eq!(s.count, 3);
        assert_eq!(s.message_type_counts["OrderCreated"], 2);
        assert_eq!(s.outcome_counts["success"], 2);
        assert_eq!(s.outcome_counts["failure"], 1);
        assert!((s.error_rate - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn percentiles_match_sorted_median_and_tail() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40, 50] {
            c.record(sample("T", d, "success"));
        }
        let s = c.summary();
        assert!((s.p50_duration_ms - 30.0).abs() < f64::EPSILON);
        assert!(s.p99_duration_ms <= 50.0);
    }

    #[test]
    fn clear_empties_the_collector() {
        let c = MetricsCollector::new();
        c.record(sample("T", 1, "success"));
        c.clear();
        assert!(c.is_empty());
    }
}
