// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence backends for audit events.

use async_trait::async_trait;
use conduit_core::AuditEvent;
use tokio::sync::Mutex;

/// Persistence contract the security event logger drains micro-batches
/// into.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist `events`. The logger falls back to storing each event
    /// individually when this fails for the whole batch.
    async fn store_events(&self, events: &[AuditEvent]) -> Result<(), String>;
}

/// An in-process, non-persistent store. Useful for tests and for
/// single-process deployments that only care about the in-memory
/// `events()` accumulation.
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events stored so far, in enqueue order.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    /// Number of events stored so far.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Whether no events have been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn store_events(&self, events: &[AuditEvent]) -> Result<(), String> {
        self.events.lock().await.extend_from_slice(events);
        Ok(())
    }
}

/// A store that discards every event; the default when no persistence is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditStore;

#[async_trait]
impl AuditStore for NullAuditStore {
    async fn store_events(&self, _events: &[AuditEvent]) -> Result<(), String> {
        Ok(())
    }
}
