// SPDX-License-Identifier: MIT OR Apache-2.0
//! The telemetry middleware: times the remainder of the chain and
//! records one [`DispatchMetrics`] entry per dispatch.

use std::time::Instant;

use async_trait::async_trait;
use conduit_core::{DispatchResult, Message, MessageContext, MessageKind};
use conduit_middleware::{Middleware, Next, Stage};

use crate::collector::{DispatchMetrics, MetricsCollector};

fn kind_label(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Action => "action",
        MessageKind::Event => "event",
        MessageKind::Query => "query",
    }
}

fn outcome_label<T>(result: &DispatchResult<T>) -> &'static str {
    match result {
        DispatchResult::Success { .. } => "success",
        DispatchResult::Failure { .. } => "failure",
        DispatchResult::AuthenticationFailed { .. } => "authentication_failed",
        DispatchResult::RateLimitExceeded { .. } => "rate_limit_exceeded",
        DispatchResult::InputValidationFailed { .. } => "input_validation_failed",
        DispatchResult::Cancelled => "cancelled",
    }
}

/// Wraps `next`, recording duration and outcome into a shared
/// [`MetricsCollector`].
pub struct TelemetryMiddleware {
    collector: MetricsCollector,
}

impl TelemetryMiddleware {
    /// Build a middleware recording into `collector`.
    #[must_use]
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    /// The underlying collector, for pulling summaries outside the
    /// pipeline.
    #[must_use]
    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}

#[async_trait]
impl Middleware for TelemetryMiddleware {
    fn stage(&self) -> Stage {
        Stage::Telemetry
    }

    fn name(&self) -> &str {
        "telemetry"
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        let start = Instant::now();
        let message_type = message.message_type.clone();
        let kind = message.kind;
        let result = next.call(message, context).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = outcome_label(&result);
        self.collector.record(DispatchMetrics {
            message_type,
            kind: kind_label(kind).to_string(),
            outcome: outcome.to_string(),
            duration_ms,
            errors_count: u64::from(outcome != "success"),
        });
        result
    }
}
