// SPDX-License-Identifier: MIT OR Apache-2.0
//! The dead-letter queue: enqueue, query, replay, purge, and statistics
//! over a pluggable [`DeadLetterStore`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use conduit_core::{DeadLetterEntry, DeadLetterQueryFilter, DeadLetterReason};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{DeadLetterStatistics, DeadLetterStore, NullDeadLetterStore};

/// Re-dispatches the original message for a replayed dead-letter entry.
///
/// The dead-letter queue has no handler registry of its own; the caller
/// (typically the top-level dispatcher) supplies one of these so `Replay`
/// can push the message back through the normal pipeline.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    /// Re-dispatch `entry`. `Ok(())` marks the entry replayed; `Err`
    /// leaves it replay-eligible.
    async fn replay(&self, entry: &DeadLetterEntry) -> Result<(), String>;
}

/// Parameters accepted by [`DeadLetterQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    /// The original message's id.
    pub message_id: String,
    /// The original message's logical type.
    pub message_type: String,
    /// Serialized message body.
    pub message_body: Vec<u8>,
    /// Serialized message metadata (headers, features).
    pub message_metadata: String,
    /// Captured exception details, included iff the caller opted in.
    pub exception_details: Option<String>,
    /// How many times processing was attempted.
    pub processing_attempts: u32,
    /// When the first attempt occurred.
    pub first_attempt_at: Option<chrono::DateTime<Utc>>,
    /// When the most recent attempt occurred.
    pub last_attempt_at: Option<chrono::DateTime<Utc>>,
    /// The originating transport or queue name.
    pub source_system: Option<String>,
    /// The original message's correlation id.
    pub correlation_id: Option<String>,
    /// Arbitrary additional metadata.
    pub properties: BTreeMap<String, Value>,
}

/// The dead-letter queue.
pub struct DeadLetterQueue {
    store: Arc<dyn DeadLetterStore>,
}

impl DeadLetterQueue {
    /// Build a queue backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DeadLetterStore>) -> Self {
        Self { store }
    }

    /// A queue backed by [`NullDeadLetterStore`]: enqueues succeed but are
    /// discarded, every query returns empty/zero/false.
    #[must_use]
    pub fn null() -> Self {
        Self::new(Arc::new(NullDeadLetterStore))
    }

    /// Append a new entry with `reason`, returning its assigned id.
    pub async fn enqueue(&self, request: EnqueueRequest, reason: DeadLetterReason) -> Result<String, String> {
        let entry = DeadLetterEntry {
            id: Uuid::new_v4().to_string(),
            message_id: request.message_id,
            message_type: request.message_type,
            message_body: request.message_body,
            message_metadata: request.message_metadata,
            reason,
            exception_details: request.exception_details,
            processing_attempts: request.processing_attempts,
            first_attempt_at: request.first_attempt_at,
            last_attempt_at: request.last_attempt_at,
            moved_to_dead_letter_at: Utc::now(),
            is_replayed: false,
            replayed_at: None,
            source_system: request.source_system,
            correlation_id: request.correlation_id,
            properties: request.properties,
        };
        self.store.store(entry).await
    }

    /// Entries matching `filter`, capped at `limit` if given.
    pub async fn get_entries(&self, filter: &DeadLetterQueryFilter, limit: Option<usize>) -> Vec<DeadLetterEntry> {
        self.store.get_entries(filter, limit).await
    }

    /// A single entry by id.
    pub async fn get_entry(&self, entry_id: &str) -> Option<DeadLetterEntry> {
        self.store.get_entry(entry_id).await
    }

    /// Replay a single entry through `handler`. Fails fast if the entry is
    /// missing; on handler failure the entry stays replay-eligible.
    pub async fn replay(&self, entry_id: &str, handler: &dyn ReplayHandler) -> bool {
        let Some(entry) = self.store.get_entry(entry_id).await else {
            return false;
        };
        match handler.replay(&entry).await {
            Ok(()) => self.store.mark_replayed(entry_id).await,
            Err(_) => false,
        }
    }

    /// Replay every entry matching `filter`, returning the count
    /// successfully replayed.
    pub async fn replay_batch(&self, filter: &DeadLetterQueryFilter, handler: &dyn ReplayHandler) -> u64 {
        let entries = self.store.get_entries(filter, None).await;
        let mut replayed = 0u64;
        for entry in entries {
            if handler.replay(&entry).await.is_ok() && self.store.mark_replayed(&entry.id).await {
                replayed += 1;
            }
        }
        replayed
    }

    /// Remove a single entry.
    pub async fn purge(&self, entry_id: &str) -> bool {
        self.store.purge(entry_id).await
    }

    /// Remove every entry older than `age`, returning the count removed.
    pub async fn purge_older_than(&self, age: Duration) -> u64 {
        self.store.purge_older_than(age).await
    }

    /// Count of entries matching `filter`.
    pub async fn get_count(&self, filter: &DeadLetterQueryFilter) -> u64 {
        self.store.get_count(filter).await
    }

    /// Aggregate statistics over `time_window`.
    pub async fn get_statistics(&self, time_window: Duration) -> DeadLetterStatistics {
        self.store.get_statistics(time_window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDeadLetterStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        calls: AtomicU32,
        fail_next: StdMutex<bool>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self { calls: AtomicU32::new(0), fail_next: StdMutex::new(false) }
        }
    }

    #[async_trait]
    impl ReplayHandler for RecordingHandler {
        async fn replay(&self, _entry: &DeadLetterEntry) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_next.lock().unwrap() {
                Err("handler exploded".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn queue() -> DeadLetterQueue {
        DeadLetterQueue::new(Arc::new(InMemoryDeadLetterStore::new()))
    }

    #[tokio::test]
    async fn enqueue_then_get_entry_round_trips() {
        let q = queue();
        let id = q
            .enqueue(
                EnqueueRequest {
                    message_id: "m1".into(),
                    message_type: "OrderCreated".into(),
                    message_body: b"{}".to_vec(),
                    message_metadata: "{}".into(),
                    processing_attempts: 4,
                    ..Default::default()
                },
                DeadLetterReason::MaxRetriesExceeded,
            )
            .await
            .unwrap();
        let entry = q.get_entry(&id).await.unwrap();
        assert_eq!(entry.processing_attempts, 4);
        assert_eq!(entry.reason, DeadLetterReason::MaxRetriesExceeded);
        assert!(!entry.is_replayed);
    }

    #[tokio::test]
    async fn replay_marks_entry_replayed_on_success() {
        let q = queue();
        let id = q
            .enqueue(
                EnqueueRequest { message_id: "m1".into(), message_type: "T".into(), ..Default::default() },
                DeadLetterReason::PoisonMessage,
            )
            .await
            .unwrap();
        let handler = RecordingHandler::new();
        assert!(q.replay(&id, &handler).await);
        let entry = q.get_entry(&id).await.unwrap();
        assert!(entry.is_replayed);
        assert!(entry.replayed_at.is_some());
    }

    #[tokio::test]
    async fn replay_leaves_entry_eligible_on_handler_failure() {
        let q = queue();
        let id = q
            .enqueue(
                EnqueueRequest { message_id: "m1".into(), message_type: "T".into(), ..Default::default() },
                DeadLetterReason::PoisonMessage,
            )
            .await
            .unwrap();
        let handler = RecordingHandler::new();
        *handler.fail_next.lock().unwrap() = true;
        assert!(!q.replay(&id, &handler).await);
        let entry = q.get_entry(&id).await.unwrap();
        assert!(!entry.is_replayed);
    }

    #[tokio::test]
    async fn replay_missing_entry_fails_fast() {
        let q = queue();
        let handler = RecordingHandler::new();
        assert!(!q.replay("missing", &handler).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn replay_batch_counts_only_successful_replays() {
        let q = queue();
        for i in 0..3 {
            q.enqueue(
                EnqueueRequest { message_id: format!("m{i}"), message_type: "T".into(), ..Default::default() },
                DeadLetterReason::PoisonMessage,
            )
            .await
            .unwrap();
        }
        let handler = RecordingHandler::new();
        let count = q.replay_batch(&DeadLetterQueryFilter::pending_only(), &handler).await;
        assert_eq!(count, 3);
        assert_eq!(q.get_count(&DeadLetterQueryFilter::pending_only()).await, 0);
    }

    #[tokio::test]
    async fn null_queue_discards_everything() {
        let q = DeadLetterQueue::null();
        let id = q
            .enqueue(
                EnqueueRequest { message_id: "m1".into(), message_type: "T".into(), ..Default::default() },
                DeadLetterReason::Unknown,
            )
            .await
            .unwrap();
        assert!(q.get_entry(&id).await.is_none());
        assert_eq!(q.get_count(&DeadLetterQueryFilter::all()).await, 0);
    }
}
