// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key resolution and an in-process, zeroizing-on-clear key cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Resolves signing/verification key material for a `(key_id, purpose,
/// tenant_id)` triple.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Return the key bytes for this triple, or `None` if unresolvable.
    async fn resolve_key(
        &self,
        key_id: Option<&str>,
        purpose: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Option<Vec<u8>>;
}

fn cache_key(key_id: Option<&str>, purpose: Option<&str>, tenant_id: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        key_id.unwrap_or(""),
        purpose.unwrap_or(""),
        tenant_id.unwrap_or("")
    )
}

/// Caches resolved key material in-process, keyed by the resolution
/// triple. All cached bytes are overwritten with zeroes before the cache
/// is cleared, so no key material survives a [`KeyCache::clear`] call.
pub struct KeyCache {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl KeyCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Resolve a key, serving a cached value unless `bypass_cache` is set
    /// (used for the single cache-bypass retry after a verification
    /// failure).
    pub async fn get_or_fetch(
        &self,
        provider: &dyn KeyProvider,
        key_id: Option<&str>,
        purpose: Option<&str>,
        tenant_id: Option<&str>,
        bypass_cache: bool,
    ) -> Option<Vec<u8>> {
        let cache_key = cache_key(key_id, purpose, tenant_id);
        if !bypass_cache {
            if let Some(bytes) = self.entries.lock().await.get(&cache_key) {
                return Some(bytes.clone());
            }
        }
        let bytes = provider.resolve_key(key_id, purpose, tenant_id).await?;
        self.entries.lock().await.insert(cache_key, bytes.clone());
        Some(bytes)
    }

    /// Zero every cached key's bytes, then drop them.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        for bytes in entries.values_mut() {
            bytes.iter_mut().for_each(|b| *b = 0);
        }
        entries.clear();
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed, in-memory `KeyProvider` for a single key, independent of the
/// resolution triple. A standalone tenant-specific key can be added for
/// tests exercising `tenant_algorithms`/per-tenant key lookups.
pub struct StaticKeyProvider {
    default_key: Vec<u8>,
    tenant_keys: BTreeMap<String, Vec<u8>>,
}

impl StaticKeyProvider {
    /// A provider returning `default_key` regardless of the requested
    /// triple.
    #[must_use]
    pub fn new(default_key: impl Into<Vec<u8>>) -> Self {
        Self {
            default_key: default_key.into(),
            tenant_keys: BTreeMap::new(),
        }
    }

    /// Register a tenant-specific key, preferred over the default when
    /// `tenant_id` matches.
    #[must_use]
    pub fn with_tenant_key(mut self, tenant_id: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        self.tenant_keys.insert(tenant_id.into(), key.into());
        self
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn resolve_key(&self, _key_id: Option<&str>, _purpose: Option<&str>, tenant_id: Option<&str>) -> Option<Vec<u8>> {
        if let Some(tenant_id) = tenant_id {
            if let Some(key) = self.tenant_keys.get(tenant_id) {
                return Some(key.clone());
            }
        }
        Some(self.default_key.clone())
    }
}
