// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adapts [`conduit_routing::Router`] into a pipeline [`Middleware`] stage.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{DispatchResult, Message, MessageContext, MessageKindMask, ProblemDetails, RoutingDecision};
use conduit_error::ErrorCode;
use conduit_middleware::{Middleware, Next, Stage};
use conduit_routing::Router;

/// Well-known `properties` key the resolved [`RoutingDecision`] is stored
/// under for downstream middleware and the handler to read.
pub const PROPERTY_ROUTING_DECISION: &str = "RoutingDecision";

/// Resolves the transport and endpoints for a message and stashes the
/// [`RoutingDecision`] on the context before continuing the chain. A
/// failed resolution short-circuits with [`ErrorCode::RoutingFailed`].
pub struct RoutingMiddleware {
    router: Arc<Router>,
}

impl RoutingMiddleware {
    /// Wrap `router` as a pipeline stage.
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Middleware for RoutingMiddleware {
    fn stage(&self) -> Stage {
        Stage::Routing
    }

    fn applicable_kinds(&self) -> MessageKindMask {
        MessageKindMask::ALL
    }

    fn name(&self) -> &str {
        "routing"
    }

    async fn invoke(
        &self,
        message: &mut Message,
        context: &mut MessageContext,
        next: Next<'_>,
    ) -> DispatchResult {
        let decision = self.router.dispatch_route(message, context).await;
        let failed = matches!(decision, RoutingDecision::Failure { .. });
        context.set_property(PROPERTY_ROUTING_DECISION, &decision);

        if failed {
            let detail = match &decision {
                RoutingDecision::Failure { reason } => reason.clone(),
                RoutingDecision::Success { .. } => unreachable!(),
            };
            return DispatchResult::Failure {
                problem_details: ProblemDetails {
                    title: "routing failed".to_string(),
                    detail: Some(detail),
                    code: ErrorCode::RoutingFailed,
                },
            };
        }

        next.call(message, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{MessageBuilder, MessageKind};
    use conduit_middleware::{CancellationToken, PipelineBuilder};
    use conduit_routing::RouterBuilder;

    #[tokio::test]
    async fn successful_route_is_stashed_on_context_and_chain_continues() {
        let router = Arc::new(RouterBuilder::new().transport_rule("Order*", "orders-bus").build());
        let pipeline = PipelineBuilder::new().middleware(RoutingMiddleware::new(router)).build();

        let mut message = MessageBuilder::new("OrderCreated", MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = pipeline
            .dispatch(&mut message, &mut context, CancellationToken::new(), |_, _| {
                Box::pin(async { DispatchResult::ok() })
            })
            .await;

        assert!(result.succeeded());
        assert!(context.properties.contains_key(PROPERTY_ROUTING_DECISION));
    }

    #[tokio::test]
    async fn unresolvable_transport_short_circuits_with_routing_failed() {
        let router = Arc::new(RouterBuilder::new().default_transport("").build());
        let pipeline = PipelineBuilder::new().middleware(RoutingMiddleware::new(router)).build();

        let mut message = MessageBuilder::new("Anything", MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = pipeline
            .dispatch(&mut message, &mut context, CancellationToken::new(), |_, _| {
                Box::pin(async { DispatchResult::ok() })
            })
            .await;

        match result {
            DispatchResult::Failure { problem_details } => {
                assert_eq!(problem_details.code, ErrorCode::RoutingFailed);
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }
}
