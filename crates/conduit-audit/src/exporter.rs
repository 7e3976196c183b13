// SPDX-License-Identifier: MIT OR Apache-2.0
//! Optional forwarding of drained batches to a remote sink.

use conduit_core::AuditEvent;

/// Trait for forwarding a drained batch elsewhere (a SIEM, a metrics
/// pipeline, etc). Export failures are logged by the logger and never
/// block or fail the store path.
pub trait AuditExporter: Send + Sync {
    /// Export `events`. Returns the serialized output on success.
    fn export(&self, events: &[AuditEvent]) -> Result<String, String>;
}

/// Exports a batch as a JSON array, for forwarding to log-shipping
/// sidecars that expect line-delimited or batched JSON.
#[derive(Debug, Default)]
pub struct JsonAuditExporter;

impl AuditExporter for JsonAuditExporter {
    fn export(&self, events: &[AuditEvent]) -> Result<String, String> {
        serde_json::to_string(events).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{AuditEventType, Severity};

    #[test]
    fn json_exporter_serializes_the_batch() {
        let exporter = JsonAuditExporter;
        let events = vec![AuditEvent::new(AuditEventType::RateLimitExceeded, Severity::Medium, "too fast")];
        let json = exporter.export(&events).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["description"], "too fast");
    }

    #[test]
    fn json_exporter_handles_empty_batch() {
        let exporter = JsonAuditExporter;
        assert_eq!(exporter.export(&[]).unwrap(), "[]");
    }
}
