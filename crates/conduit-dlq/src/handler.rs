// SPDX-License-Identifier: MIT OR Apache-2.0
//! The poison handler: turns a handler exception or a positive poison
//! verdict into a dead-letter entry.

use std::sync::Arc;

use conduit_core::{DeadLetterReason, Message, MessageContext};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::poison::{AttemptInfo, CompositePoisonDetector};
use crate::queue::{DeadLetterQueue, EnqueueRequest};

/// Configuration for [`PoisonHandler`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoisonHandlerConfig {
    /// Whether to persist exception details on the dead-letter entry.
    /// When `false`, `exception_details` is always `None`.
    pub capture_exception_details: bool,
}

impl Default for PoisonHandlerConfig {
    fn default() -> Self {
        Self { capture_exception_details: true }
    }
}

/// Serializes a message's body and metadata, classifies the failure, and
/// hands the resulting entry to a [`DeadLetterQueue`].
pub struct PoisonHandler {
    queue: Arc<DeadLetterQueue>,
    detector: CompositePoisonDetector,
    config: PoisonHandlerConfig,
}

impl PoisonHandler {
    /// Build a handler over `queue`, consulting `detector` before
    /// quarantining on non-exception paths.
    #[must_use]
    pub fn new(queue: Arc<DeadLetterQueue>, detector: CompositePoisonDetector, config: PoisonHandlerConfig) -> Self {
        Self { queue, detector, config }
    }

    /// The dead-letter queue this handler quarantines into, for callers
    /// that need to query or replay entries directly.
    #[must_use]
    pub fn queue(&self) -> &Arc<DeadLetterQueue> {
        &self.queue
    }

    fn serialize_metadata(message: &Message) -> String {
        let headers: Vec<(String, String)> = message.headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        serde_json::json!({
            "headers": headers,
            "features": message.features,
            "priority": message.priority,
        })
        .to_string()
    }

    fn build_request(message: &Message, context: &MessageContext, attempts: &AttemptInfo, exception: Option<String>) -> EnqueueRequest {
        EnqueueRequest {
            message_id: message.id.clone(),
            message_type: message.message_type.clone(),
            message_body: message.body.clone(),
            message_metadata: Self::serialize_metadata(message),
            exception_details: exception,
            processing_attempts: attempts.processing_attempts,
            first_attempt_at: attempts.first_attempt_at,
            last_attempt_at: attempts.last_attempt_at,
            source_system: None,
            correlation_id: context.correlation_id.clone(),
            properties: Default::default(),
        }
    }

    /// On a handler exception, always quarantine (no detector
    /// consultation). On store failure the error is returned so the
    /// caller can retry the message later.
    pub async fn on_handler_error(
        &self,
        message: &Message,
        context: &MessageContext,
        attempts: &AttemptInfo,
        error_message: &str,
    ) -> Result<String, String> {
        let exception = self.config.capture_exception_details.then(|| error_message.to_string());
        let request = Self::build_request(message, context, attempts, exception);
        match self.queue.enqueue(request, DeadLetterReason::UnhandledException).await {
            Ok(id) => Ok(id),
            Err(err) => {
                error!(target: "conduit.dlq.poison", error = %err, message_id = %message.id, "failed to store dead-letter entry, message will be retried");
                Err(err)
            }
        }
    }

    /// Consults the poison detector chain; if it returns a positive
    /// verdict, quarantines the message and returns the new entry's id.
    /// Returns `Ok(None)` when no detector fired.
    pub async fn check_and_quarantine(
        &self,
        message: &Message,
        context: &MessageContext,
        attempts: &AttemptInfo,
    ) -> Result<Option<String>, String> {
        let verdict = self.detector.is_poison(attempts).await;
        if !verdict.is_poison {
            return Ok(None);
        }
        let reason = verdict.reason.unwrap_or(DeadLetterReason::PoisonMessage);
        let exception = self
            .config
            .capture_exception_details
            .then(|| format!("detected by {}: {:?}", verdict.detector_name, verdict.details));
        let request = Self::build_request(message, context, attempts, exception);
        self.queue.enqueue(request, reason).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poison::MaxRetriesExceeded;
    use crate::store::InMemoryDeadLetterStore;
    use conduit_core::{DeadLetterQueryFilter, MessageBuilder, MessageKind};

    fn handler(detector: CompositePoisonDetector) -> (PoisonHandler, Arc<DeadLetterQueue>) {
        let queue = Arc::new(DeadLetterQueue::new(Arc::new(InMemoryDeadLetterStore::new())));
        (PoisonHandler::new(queue.clone(), detector, PoisonHandlerConfig::default()), queue)
    }

    #[tokio::test]
    async fn handler_exception_always_quarantines() {
        let (handler, queue) = handler(CompositePoisonDetector::new());
        let message = MessageBuilder::new("OrderCreated", MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let attempts = AttemptInfo::first_attempt();

        let id = handler.on_handler_error(&message, &context, &attempts, "boom").await.unwrap();
        let entry = queue.get_entry(&id).await.unwrap();
        assert_eq!(entry.reason, DeadLetterReason::UnhandledException);
        assert_eq!(entry.exception_details.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn exception_details_are_omitted_when_capture_is_disabled() {
        let queue = Arc::new(DeadLetterQueue::new(Arc::new(InMemoryDeadLetterStore::new())));
        let handler = PoisonHandler::new(
            queue.clone(),
            CompositePoisonDetector::new(),
            PoisonHandlerConfig { capture_exception_details: false },
        );
        let message = MessageBuilder::new("T", MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let attempts = AttemptInfo::first_attempt();

        let id = handler.on_handler_error(&message, &context, &attempts, "boom").await.unwrap();
        let entry = queue.get_entry(&id).await.unwrap();
        assert!(entry.exception_details.is_none());
    }

    #[tokio::test]
    async fn positive_detector_verdict_quarantines_with_its_reason() {
        let (handler, queue) = handler(CompositePoisonDetector::new().with_detector(MaxRetriesExceeded::new(3)));
        let message = MessageBuilder::new("T", MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let attempts = AttemptInfo { processing_attempts: 4, ..AttemptInfo::first_attempt() };

        let id = handler.check_and_quarantine(&message, &context, &attempts).await.unwrap().unwrap();
        let entry = queue.get_entry(&id).await.unwrap();
        assert_eq!(entry.reason, DeadLetterReason::MaxRetriesExceeded);
        assert_eq!(entry.processing_attempts, 4);
    }

    #[tokio::test]
    async fn clean_verdict_does_not_quarantine() {
        let (handler, queue) = handler(CompositePoisonDetector::new().with_detector(MaxRetriesExceeded::new(10)));
        let message = MessageBuilder::new("T", MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let attempts = AttemptInfo::first_attempt();

        let result = handler.check_and_quarantine(&message, &context, &attempts).await.unwrap();
        assert!(result.is_none());
        assert_eq!(queue.get_count(&DeadLetterQueryFilter::all()).await, 0);
    }
}
