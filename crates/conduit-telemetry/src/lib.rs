// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Per-dispatch timing and outcome metrics: a `Telemetry`-stage
//! middleware feeding a thread-safe collector with percentile summaries.

/// `MetricsCollector`, `DispatchMetrics`, `MetricsSummary`, percentiles.
pub mod collector;
/// Summary export.
pub mod exporter;
/// The `Telemetry`-stage middleware.
pub mod middleware;

pub use collector::{DispatchMetrics, MetricsCollector, MetricsSummary};
pub use exporter::{JsonExporter, TelemetryExporter};
pub use middleware::TelemetryMiddleware;
