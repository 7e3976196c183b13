// SPDX-License-Identifier: MIT OR Apache-2.0
//! Async credential retrieval and a short-TTL cache around it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Resolves named credentials (e.g. a signing key) from an external store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential bytes for `name`, or `None` if not found.
    async fn get_credential(&self, name: &str) -> Option<Vec<u8>>;
}

struct Cached {
    bytes: Vec<u8>,
    fetched_at: Instant,
}

/// A single-slot cache in front of a [`CredentialStore`] fetch, used so the
/// authentication middleware does not round-trip to the store on every
/// message.
pub(crate) struct KeyCache {
    slot: Mutex<Option<Cached>>,
}

impl KeyCache {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub(crate) async fn get_or_fetch(
        &self,
        store: &dyn CredentialStore,
        name: &str,
        ttl: Duration,
    ) -> Option<Vec<u8>> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < ttl {
                return Some(cached.bytes.clone());
            }
        }
        let bytes = store.get_credential(name).await?;
        *slot = Some(Cached {
            bytes: bytes.clone(),
            fetched_at: Instant::now(),
        });
        Some(bytes)
    }
}

/// An in-memory [`CredentialStore`] backed by a fixed map, used in tests in
/// place of a real credential vault.
#[derive(Default)]
pub struct StaticCredentialStore {
    entries: std::collections::BTreeMap<String, Vec<u8>>,
}

impl StaticCredentialStore {
    /// A store with no credentials registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential (builder-style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(name.into(), bytes.into());
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credential(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.get(name).cloned()
    }
}
