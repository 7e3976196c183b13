// SPDX-License-Identifier: MIT OR Apache-2.0
//! The rate limiting middleware.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{AuditEvent, AuditEventType, DispatchResult, Message, MessageContext, NullSecurityEventSink, SecurityEventSink, Severity};
use conduit_middleware::{Middleware, Next, Stage};
use tracing::debug;

use crate::config::{LimiterSpec, RateLimitConfig};
use crate::limiter::LimiterRegistry;

/// Admission control in front of the rest of the pipeline: token-bucket,
/// sliding-window, fixed-window, or concurrency limiting, keyed by
/// [`MessageContext::rate_limit_key`].
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    registry: LimiterRegistry,
    audit: Arc<dyn SecurityEventSink>,
}

impl RateLimitMiddleware {
    /// Build a middleware from `config` with no audit sink wired up.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            registry: LimiterRegistry::new(),
            audit: Arc::new(NullSecurityEventSink),
        }
    }

    /// Attach a security event sink; denied permits are reported to it.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Evict limiters idle longer than the configured cleanup interval.
    ///
    /// Exposed for callers to drive from their own periodic task; this
    /// middleware never spawns one itself.
    pub async fn cleanup_idle(&self) {
        self.registry.cleanup_idle(self.config.cleanup_interval).await;
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn stage(&self) -> Stage {
        Stage::RateLimiting
    }

    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        if !self.config.enabled {
            return next.call(message, context).await;
        }

        let key = context.rate_limit_key();
        let spec = self.config.spec_for_key(&key);
        let decision = self
            .registry
            .try_acquire(&key, &spec, self.config.default_retry_after_ms)
            .await;

        if !decision.granted {
            debug!(target: "conduit.ratelimit", key = %key, retry_after_ms = decision.retry_after_ms, "permit denied");
            let mut event = AuditEvent::new(
                AuditEventType::RateLimitExceeded,
                Severity::Medium,
                format!("rate limit exceeded for key {key}"),
            );
            event.correlation_id = context.correlation_id.clone();
            self.audit.record(event).await;
            return DispatchResult::RateLimitExceeded {
                retry_after_ms: decision.retry_after_ms,
            };
        }

        let result = next.call(message, context).await;

        if matches!(spec, LimiterSpec::Concurrency { .. }) {
            self.registry.release(&key).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::MessageBuilder;
    use conduit_middleware::{BoxFuture, CancellationToken, Pipeline, PipelineBuilder};
    use std::time::Duration;

    async fn run(pipeline: &Pipeline, message: &mut Message, context: &mut MessageContext) -> DispatchResult {
        pipeline
            .dispatch(message, context, CancellationToken::new(), |_, _| {
                Box::pin(async { DispatchResult::ok() }) as BoxFuture<'_, DispatchResult>
            })
            .await
    }

    #[tokio::test]
    async fn permit_granted_calls_next() {
        let mw = RateLimitMiddleware::new(RateLimitConfig::new());
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        assert!(run(&pipeline, &mut message, &mut context).await.succeeded());
    }

    #[tokio::test]
    async fn permit_denied_short_circuits_with_retry_after() {
        let config = RateLimitConfig::new().with_default(LimiterSpec::concurrency(0));
        let mw = RateLimitMiddleware::new(config);
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        match run(&pipeline, &mut message, &mut context).await {
            DispatchResult::RateLimitExceeded { retry_after_ms } => assert!(retry_after_ms > 0),
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn distinct_tenants_are_limited_independently() {
        let config = RateLimitConfig::new().with_default(LimiterSpec::concurrency(1));
        let mw = RateLimitMiddleware::new(config);
        let pipeline = PipelineBuilder::new().middleware(mw).build();

        let mut message_a = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context_a = MessageContext::new(message_a.id.clone());
        context_a.tenant_id = Some("tenant-a".into());
        assert!(run(&pipeline, &mut message_a, &mut context_a).await.succeeded());

        let mut message_b = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context_b = MessageContext::new(message_b.id.clone());
        context_b.tenant_id = Some("tenant-b".into());
        assert!(run(&pipeline, &mut message_b, &mut context_b).await.succeeded());
    }

    #[tokio::test]
    async fn disabled_middleware_always_passes_through() {
        let mw = RateLimitMiddleware::new(RateLimitConfig::new().disabled().with_default(LimiterSpec::concurrency(0)));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        assert!(run(&pipeline, &mut message, &mut context).await.succeeded());
    }

    #[tokio::test]
    async fn cleanup_idle_does_not_error_when_registry_empty() {
        let mw = RateLimitMiddleware::new(RateLimitConfig::new());
        mw.cleanup_idle().await;
    }

    #[tokio::test]
    async fn token_bucket_refills_after_the_replenishment_period() {
        let config = RateLimitConfig::new()
            .with_default(LimiterSpec::token_bucket(1, 1, Duration::from_millis(20)));
        let mw = RateLimitMiddleware::new(config);
        let pipeline = PipelineBuilder::new().middleware(mw).build();

        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        assert!(run(&pipeline, &mut message, &mut context).await.succeeded());

        let mut message2 = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context2 = MessageContext::new(message2.id.clone());
        assert!(!run(&pipeline, &mut message2, &mut context2).await.succeeded());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let mut message3 = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context3 = MessageContext::new(message3.id.clone());
        assert!(run(&pipeline, &mut message3, &mut context3).await.succeeded());
    }
}
