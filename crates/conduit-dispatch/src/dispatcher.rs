// SPDX-License-Identifier: MIT OR Apache-2.0
//! The top-level `Dispatcher`: wires the middleware pipeline, the handler
//! registry, and poison/dead-letter handling into the single entry point
//! callers invoke.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{
    DeadLetterEntry, DispatchResult, Message, MessageBuilder, MessageContext, MessageKind, ProblemDetails,
};
use conduit_dlq::{AttemptInfo, PoisonHandler, ReplayHandler, RetryConfig, retry_async};
use conduit_error::ErrorCode;
use conduit_middleware::{CancellationToken, Pipeline};
use tracing::warn;

use crate::handler::HandlerRegistry;

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    pipeline: Pipeline,
    handlers: HandlerRegistry,
    poison_handler: Option<PoisonHandler>,
    retry_config: RetryConfig,
}

impl DispatcherBuilder {
    /// Start from an already-composed [`Pipeline`] and an empty handler
    /// registry.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            handlers: HandlerRegistry::new(),
            poison_handler: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Replace the handler registry wholesale.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Set the poison handler used to quarantine exhausted or poison
    /// messages. Without one, a handler exception or poison verdict is
    /// reported as a plain [`DispatchResult::Failure`] and never
    /// quarantined.
    #[must_use]
    pub fn poison_handler(mut self, handler: PoisonHandler) -> Self {
        self.poison_handler = Some(handler);
        self
    }

    /// Override the retry/backoff policy applied around each handler
    /// invocation. Defaults to [`RetryConfig::default`].
    #[must_use]
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Finalize the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            pipeline: self.pipeline,
            handlers: self.handlers,
            poison_handler: self.poison_handler,
            retry_config: self.retry_config,
        }
    }
}

/// The runtime's single external entry point: runs a message through the
/// middleware pipeline, dispatches it to its registered handler with
/// retry/backoff, and routes unrecoverable failures to the dead-letter
/// queue.
pub struct Dispatcher {
    pipeline: Pipeline,
    handlers: HandlerRegistry,
    poison_handler: Option<PoisonHandler>,
    retry_config: RetryConfig,
}

impl Dispatcher {
    /// A builder seeded with `pipeline`.
    #[must_use]
    pub fn builder(pipeline: Pipeline) -> DispatcherBuilder {
        DispatcherBuilder::new(pipeline)
    }

    /// The handler registry this dispatcher resolves against.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Invoke the registered handler with retry/backoff, quarantining on
    /// exhaustion when a poison handler is configured.
    ///
    /// Takes `message`/`context` by value: the terminal pipeline handler
    /// closure works against clones of the in-flight message and context
    /// (see [`Self::dispatch`]) so the returned future does not borrow
    /// across the generic `Fn(&mut Message, &mut MessageContext) -> Fut`
    /// seam, which is higher-ranked over those two reference lifetimes.
    async fn invoke_handler_with_retry(&self, mut message: Message, mut context: MessageContext) -> DispatchResult {
        let Some(handler) = self.handlers.get(&message.message_type) else {
            return DispatchResult::Failure {
                problem_details: ProblemDetails {
                    title: "no handler registered".to_string(),
                    detail: Some(message.message_type.clone()),
                    code: ErrorCode::HandlerNotFound,
                },
            };
        };

        let first_attempt_at = chrono::Utc::now();
        let mut attempt_count: u32 = 0;

        let outcome = retry_async(
            &self.retry_config,
            || {
                attempt_count += 1;
                let handler = Arc::clone(&handler);
                let msg = &mut message;
                let ctx = &mut context;
                async move { handler.handle(msg, ctx).await.map_err(|e| e.to_string()) }
            },
            |_| true,
        )
        .await;

        match outcome {
            Ok(outcome) => outcome.value,
            Err(error_message) => {
                if let Some(poison_handler) = &self.poison_handler {
                    let attempts = AttemptInfo {
                        processing_attempts: attempt_count,
                        first_attempt_at: Some(first_attempt_at),
                        last_attempt_at: Some(chrono::Utc::now()),
                        retry_metadata: None,
                    };
                    // A positive poison-detector verdict (e.g. retries exhausted)
                    // classifies the entry more precisely than the bare exception
                    // path; fall back to the exception-path quarantine only when
                    // no detector fires.
                    let quarantine_result = match poison_handler.check_and_quarantine(&message, &context, &attempts).await {
                        Ok(Some(_entry_id)) => Ok(()),
                        Ok(None) => poison_handler
                            .on_handler_error(&message, &context, &attempts, &error_message)
                            .await
                            .map(|_entry_id| ()),
                        Err(store_error) => Err(store_error),
                    };
                    if let Err(store_error) = quarantine_result {
                        warn!(target: "conduit.dispatch", error = %store_error, message_id = %message.id, "dead-letter store failed, handler failure reported without quarantine");
                    }
                }
                DispatchResult::Failure {
                    problem_details: ProblemDetails {
                        title: "handler failed".to_string(),
                        detail: Some(error_message),
                        code: ErrorCode::HandlerError,
                    },
                }
            }
        }
    }

    /// Run `message` through the middleware pipeline and its registered
    /// handler.
    pub async fn dispatch(
        &self,
        mut message: Message,
        mut context: MessageContext,
        cancel: CancellationToken,
    ) -> DispatchResult {
        self.pipeline
            .dispatch(&mut message, &mut context, cancel, move |m, c| {
                let message = m.clone();
                let context = c.clone();
                async move { self.invoke_handler_with_retry(message, context).await }
            })
            .await
    }

    /// Run a query-shaped `message` through the pipeline, deserializing the
    /// handler's success payload into `T`. Returns `None` on a non-success
    /// result or a deserialization failure.
    pub async fn dispatch_query<T>(
        &self,
        message: Message,
        context: MessageContext,
        cancel: CancellationToken,
    ) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.dispatch(message, context, cancel).await {
            DispatchResult::Success { value: Some(value) } => serde_json::from_value(value).ok(),
            _ => None,
        }
    }
}

#[async_trait]
impl ReplayHandler for Dispatcher {
    /// Re-dispatches a dead-lettered entry. `DeadLetterEntry` does not
    /// store the original [`MessageKind`], so the replayed message defaults
    /// to `MessageKind::Action`; this matches the runtime's Action-biased
    /// retry semantics and is recorded as an accepted approximation, not a
    /// Query replay path (queries are typically not dead-lettered).
    async fn replay(&self, entry: &DeadLetterEntry) -> Result<(), String> {
        let message = MessageBuilder::new(entry.message_type.clone(), MessageKind::Action)
            .body(entry.message_body.clone())
            .build();
        let mut context = MessageContext::new(message.id.clone());
        if let Some(correlation_id) = &entry.correlation_id {
            context.correlation_id = Some(correlation_id.clone());
        }

        match self.dispatch(message, context, CancellationToken::new()).await {
            DispatchResult::Success { .. } => Ok(()),
            other => {
                warn!(target: "conduit.dispatch.replay", entry_id = %entry.id, ?other, "replay did not succeed");
                Err(format!("replay did not succeed: {other:?}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use conduit_core::MessageKind;
    use conduit_dlq::{DeadLetterQueue, PoisonHandlerConfig};
    use conduit_dlq::poison::CompositePoisonDetector;
    use conduit_middleware::PipelineBuilder;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _m: &mut Message, _c: &mut MessageContext) -> anyhow::Result<DispatchResult> {
            Ok(DispatchResult::ok())
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Handler for AlwaysFails {
        async fn handle(&self, _m: &mut Message, _c: &mut MessageContext) -> anyhow::Result<DispatchResult> {
            anyhow::bail!("handler exploded")
        }
    }

    struct FlakyThenOk(AtomicU32);
    #[async_trait]
    impl Handler for FlakyThenOk {
        async fn handle(&self, _m: &mut Message, _c: &mut MessageContext) -> anyhow::Result<DispatchResult> {
            if self.0.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("transient")
            } else {
                Ok(DispatchResult::ok())
            }
        }
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Total {
        amount: i64,
    }

    struct QueryHandler;
    #[async_trait]
    impl Handler for QueryHandler {
        async fn handle(&self, _m: &mut Message, _c: &mut MessageContext) -> anyhow::Result<DispatchResult> {
            Ok(DispatchResult::ok_with(serde_json::to_value(Total { amount: 42 }).unwrap()))
        }
    }

    fn message(message_type: &str) -> Message {
        MessageBuilder::new(message_type, MessageKind::Action).build()
    }

    #[tokio::test]
    async fn dispatch_succeeds_when_handler_succeeds() {
        let mut registry = HandlerRegistry::new();
        registry.register("Ping", Ok200);
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build()).handlers(registry).build();

        let msg = message("Ping");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn missing_handler_reports_handler_not_found() {
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build()).build();
        let msg = message("Unregistered");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        match result {
            DispatchResult::Failure { problem_details } => {
                assert_eq!(problem_details.code, ErrorCode::HandlerNotFound);
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let mut registry = HandlerRegistry::new();
        registry.register("Flaky", FlakyThenOk(AtomicU32::new(0)));
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build())
            .handlers(registry)
            .retry_config(RetryConfig {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
                overall_timeout: std::time::Duration::from_secs(5),
                jitter_factor: 0.0,
            })
            .build();

        let msg = message("Flaky");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn exhausted_handler_is_quarantined_when_a_poison_handler_is_configured() {
        let mut registry = HandlerRegistry::new();
        registry.register("Bad", AlwaysFails);
        let queue = Arc::new(DeadLetterQueue::null());
        let poison_handler = PoisonHandler::new(queue.clone(), CompositePoisonDetector::new(), PoisonHandlerConfig::default());
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build())
            .handlers(registry)
            .poison_handler(poison_handler)
            .retry_config(RetryConfig {
                max_retries: 0,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
                overall_timeout: std::time::Duration::from_secs(5),
                jitter_factor: 0.0,
            })
            .build();

        let msg = message("Bad");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        match result {
            DispatchResult::Failure { problem_details } => {
                assert_eq!(problem_details.code, ErrorCode::HandlerError);
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_are_classified_by_the_registered_detector_not_the_bare_exception() {
        let mut registry = HandlerRegistry::new();
        registry.register("Bad", AlwaysFails);
        let queue = Arc::new(DeadLetterQueue::new(Arc::new(conduit_dlq::store::InMemoryDeadLetterStore::new())));
        let detector = CompositePoisonDetector::new().with_detector(conduit_dlq::poison::MaxRetriesExceeded::new(4));
        let poison_handler = PoisonHandler::new(queue.clone(), detector, PoisonHandlerConfig::default());
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build())
            .handlers(registry)
            .poison_handler(poison_handler)
            .retry_config(RetryConfig {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
                overall_timeout: std::time::Duration::from_secs(5),
                jitter_factor: 0.0,
            })
            .build();

        let msg = message("Bad");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        assert!(!result.succeeded());

        let entries = queue.get_entries(&conduit_core::DeadLetterQueryFilter::all(), None).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, conduit_core::DeadLetterReason::MaxRetriesExceeded);
        assert_eq!(entries[0].processing_attempts, 4);
    }

    #[tokio::test]
    async fn dispatch_query_deserializes_the_success_payload() {
        let mut registry = HandlerRegistry::new();
        registry.register("GetTotal", QueryHandler);
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build()).handlers(registry).build();

        let msg = MessageBuilder::new("GetTotal", MessageKind::Query).build();
        let ctx = MessageContext::new(msg.id.clone());
        let total: Option<Total> = dispatcher.dispatch_query(msg, ctx, CancellationToken::new()).await;
        assert_eq!(total, Some(Total { amount: 42 }));
    }

    #[tokio::test]
    async fn replay_redispatches_a_dead_letter_entry_against_the_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register("Ping", Ok200);
        let dispatcher = Dispatcher::builder(PipelineBuilder::new().build()).handlers(registry).build();

        let entry = DeadLetterEntry {
            id: "dl1".into(),
            message_id: "m1".into(),
            message_type: "Ping".into(),
            message_body: b"{}".to_vec(),
            message_metadata: "{}".into(),
            reason: conduit_core::DeadLetterReason::UnhandledException,
            exception_details: None,
            processing_attempts: 1,
            first_attempt_at: None,
            last_attempt_at: None,
            moved_to_dead_letter_at: chrono::Utc::now(),
            is_replayed: false,
            replayed_at: None,
            source_system: None,
            correlation_id: None,
            properties: Default::default(),
        };

        assert!(dispatcher.replay(&entry).await.is_ok());
    }

    #[tokio::test]
    async fn full_stack_composes_rate_limiting_validation_and_routing_ahead_of_the_handler() {
        use conduit_ratelimit::{RateLimitConfig, RateLimitMiddleware};
        use conduit_routing::RouterBuilder;
        use conduit_validate::{ValidationConfig, ValidationMiddleware};

        let router = Arc::new(RouterBuilder::new().transport_rule("Order*", "orders-bus").build());
        let pipeline = PipelineBuilder::new()
            .middleware(RateLimitMiddleware::new(RateLimitConfig::default()))
            .middleware(ValidationMiddleware::new(ValidationConfig::new()))
            .middleware(crate::routing::RoutingMiddleware::new(router))
            .build();

        let mut registry = HandlerRegistry::new();
        registry.register("OrderCreated", Ok200);
        let dispatcher = Dispatcher::builder(pipeline).handlers(registry).build();

        let msg = message("OrderCreated");
        let ctx = MessageContext::new(msg.id.clone());
        let result = dispatcher.dispatch(msg, ctx, CancellationToken::new()).await;
        assert!(result.succeeded());
    }
}
