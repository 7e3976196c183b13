// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed wrapper around the message-type → handler map used by the
//! dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{DispatchResult, Message, MessageContext};

/// A message handler resolved by logical [`Message::message_type`].
///
/// Returning `Err` signals a handler exception (§4.F); the dispatcher
/// classifies it as retryable or poison via the configured
/// [`conduit_dlq::RetryConfig`] and [`conduit_dlq::PoisonDetector`] chain.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process `message`, optionally reading/writing per-dispatch
    /// `context` properties set by upstream middleware.
    async fn handle(
        &self,
        message: &mut Message,
        context: &mut MessageContext,
    ) -> anyhow::Result<DispatchResult>;
}

/// A typed registry of named [`Handler`] implementations, keyed by the
/// message's logical [`Message::message_type`].
///
/// The source's reflection-based "three-tier resolution" (intercepted →
/// precompiled → runtime) collapses to this single explicit lookup: a
/// handler is registered once, ahead of time, by the message type it
/// serves.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `message_type`, replacing any previous
    /// entry.
    pub fn register(&mut self, message_type: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(message_type.into(), Arc::new(handler));
    }

    /// Register an already-shared handler.
    pub fn register_arc(&mut self, message_type: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(message_type.into(), handler);
    }

    /// Look up the handler registered for `message_type`.
    #[must_use]
    pub fn get(&self, message_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(message_type).cloned()
    }

    /// Whether a handler is registered for `message_type`.
    #[must_use]
    pub fn contains(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// A sorted list of the message types with a registered handler.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::MessageKind;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _m: &mut Message, _c: &mut MessageContext) -> anyhow::Result<DispatchResult> {
            Ok(DispatchResult::ok())
        }
    }

    #[test]
    fn registers_and_looks_up_by_message_type() {
        let mut registry = HandlerRegistry::new();
        assert!(!registry.contains("OrderCreated"));
        registry.register("OrderCreated", Echo);
        assert!(registry.contains("OrderCreated"));
        assert!(registry.get("OrderCreated").is_some());
        assert!(registry.get("Unregistered").is_none());
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("Zeta", Echo);
        registry.register("Alpha", Echo);
        assert_eq!(registry.list(), vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn registered_handler_runs() {
        let mut registry = HandlerRegistry::new();
        registry.register("T", Echo);
        let handler = registry.get("T").unwrap();
        let mut message = conduit_core::MessageBuilder::new("T", MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = handler.handle(&mut message, &mut context).await.unwrap();
        assert!(result.succeeded());
    }
}
