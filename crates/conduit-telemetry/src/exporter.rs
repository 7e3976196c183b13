// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exporting aggregated metrics summaries.

use crate::collector::MetricsSummary;

/// Trait for exporting a collected summary.
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports a summary as pretty-printed JSON.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}
