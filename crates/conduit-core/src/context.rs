// SPDX-License-Identifier: MIT OR Apache-2.0
//! The mutable per-invocation dispatch context.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known `Items` key: the message's delivery direction, written by the
/// transport adapter and read by the signing middleware.
pub const ITEM_MESSAGE_DIRECTION: &str = "MessageDirection";
/// Well-known `Items` key: the raw bearer token, written by a transport
/// adapter before authentication runs.
pub const ITEM_AUTH_TOKEN: &str = "AuthToken";
/// Well-known `Items` key: the tenant id used to key rate limiters.
pub const ITEM_TENANT_ID: &str = "TenantId";
/// Well-known `Items` key: the incoming message signature to verify.
pub const ITEM_MESSAGE_SIGNATURE: &str = "MessageSignature";

/// A mutable per-invocation record distinct from the [`crate::Message`]
/// envelope.
///
/// Belongs to exactly one message dispatch and is never shared across
/// concurrent dispatches — each dispatch constructs its own context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    /// The dispatched message's id.
    pub message_id: String,
    /// Propagated correlation id, if any.
    pub correlation_id: Option<String>,
    /// When this context was created for the dispatch.
    pub received_timestamp_utc: DateTime<Utc>,
    /// Tenant id, populated by authentication or set by the caller.
    pub tenant_id: Option<String>,
    /// Transient hand-offs between middleware stages (e.g. the raw token
    /// extracted by a transport adapter for authentication to consume).
    pub items: BTreeMap<String, Value>,
    /// Derived values exposed to the handler (e.g. `Principal`, `UserId`,
    /// `Roles`, `AuthenticatedAt`, `MessageSignature`).
    pub properties: BTreeMap<String, Value>,
}

impl MessageContext {
    /// Create a fresh context for dispatching `message_id`.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            correlation_id: None,
            received_timestamp_utc: Utc::now(),
            tenant_id: None,
            items: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the correlation id (builder-style).
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Read an `Items` entry as a string, if present and a JSON string.
    #[must_use]
    pub fn item_str(&self, key: &str) -> Option<&str> {
        self.items.get(key).and_then(Value::as_str)
    }

    /// Write an `Items` entry.
    ///
    /// `Items` is for transient middleware-to-middleware hand-offs; it is
    /// not guaranteed to be visible to the caller after dispatch.
    pub fn set_item(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.items.insert(key.into(), v);
        }
    }

    /// Read a `Properties` entry as a string, if present and a JSON string.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Write a `Properties` entry.
    ///
    /// Per the pipeline's context rules, middleware MUST NOT delete keys
    /// written by earlier stages — callers should only ever add or
    /// overwrite, never remove, entries written by upstream middleware.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.properties.insert(key.into(), v);
        }
    }

    /// Read the tenant id via the rate-limiter's key convention: primary
    /// key is `items["TenantId"]`, falling back to the context's own
    /// `tenant_id` field.
    #[must_use]
    pub fn rate_limit_key(&self) -> String {
        self.item_str(ITEM_TENANT_ID)
            .map(str::to_owned)
            .or_else(|| self.tenant_id.clone())
            .unwrap_or_else(|| "__default__".to_string())
    }
}
