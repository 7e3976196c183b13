// SPDX-License-Identifier: MIT OR Apache-2.0
//! The immutable message envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signing::SignedMessage;

/// One of Action, Event, Query — used to gate middleware applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A command that mutates state; expects an acknowledgement, not a value.
    Action,
    /// A fact that has already happened; fire-and-forget.
    Event,
    /// A read that expects a typed value back.
    Query,
}

/// Bitmask over [`MessageKind`] declaring which kinds a middleware applies
/// to.
///
/// Hand-rolled as a `u8` newtype rather than pulling in `bitflags` for a
/// three-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageKindMask(u8);

impl MessageKindMask {
    const ACTION: u8 = 0b001;
    const EVENT: u8 = 0b010;
    const QUERY: u8 = 0b100;

    /// Matches no message kind.
    pub const NONE: Self = Self(0);
    /// Matches every message kind.
    pub const ALL: Self = Self(Self::ACTION | Self::EVENT | Self::QUERY);

    /// A mask matching only [`MessageKind::Action`].
    #[must_use]
    pub const fn action() -> Self {
        Self(Self::ACTION)
    }

    /// A mask matching only [`MessageKind::Event`].
    #[must_use]
    pub const fn event() -> Self {
        Self(Self::EVENT)
    }

    /// A mask matching only [`MessageKind::Query`].
    #[must_use]
    pub const fn query() -> Self {
        Self(Self::QUERY)
    }

    /// A mask matching [`MessageKind::Action`] and [`MessageKind::Event`]
    /// (used by the authentication middleware).
    #[must_use]
    pub const fn action_and_event() -> Self {
        Self(Self::ACTION | Self::EVENT)
    }

    /// Combine this mask with another.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether this mask matches the given kind.
    #[must_use]
    pub const fn contains(&self, kind: MessageKind) -> bool {
        let bit = match kind {
            MessageKind::Action => Self::ACTION,
            MessageKind::Event => Self::EVENT,
            MessageKind::Query => Self::QUERY,
        };
        self.0 & bit != 0
    }
}

impl Default for MessageKindMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Ordered, case-sensitive name→value header mapping.
///
/// Preserves insertion order (unlike a `HashMap`) since header order can be
/// meaningful to transport adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// An empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header by exact (case-sensitive) name, returning the first
    /// match.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append or replace a header value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value.into();
        } else {
            self.0.push((name, value.into()));
        }
    }

    /// Iterate header pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Structural capability: exposes a mutable header mapping.
///
/// Middleware detects this capability structurally rather than via a
/// downcast registry — every [`Message`] carries headers, so the
/// capability is always present.
pub trait HasHeaders {
    /// Read-only access to the header mapping.
    fn headers(&self) -> &Headers;
    /// Mutable access to the header mapping.
    fn headers_mut(&mut self) -> &mut Headers;
}

/// Structural capability: the message may carry an attached signature
/// envelope produced by the signing middleware.
pub trait HasSignature {
    /// The attached signature, if the message has been signed.
    fn signature(&self) -> Option<&SignedMessage>;
    /// Attach or replace the signature envelope.
    fn set_signature(&mut self, signed: Option<SignedMessage>);
}

/// Structural capability: the message carries a delivery priority hint.
pub trait HasPriority {
    /// The message's priority; higher values are more urgent. Defaults to
    /// `0` when unset.
    fn priority(&self) -> i32;
    /// Set the delivery priority hint.
    fn set_priority(&mut self, priority: i32);
}

/// An immutable message envelope routed from a producer to a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Opaque string, unique per envelope.
    pub id: String,
    /// Propagated across causally-related messages.
    pub correlation_id: Option<String>,
    /// Wall-clock creation time.
    pub timestamp: DateTime<Utc>,
    /// Gates middleware applicability.
    pub kind: MessageKind,
    /// Fully-qualified logical type name used by routing and handler
    /// lookup.
    pub message_type: String,
    /// Ordered, case-sensitive header mapping.
    pub headers: Headers,
    /// Opaque payload bytes.
    pub body: Vec<u8>,
    /// Capability bag holding per-message toggles.
    pub features: BTreeMap<String, serde_json::Value>,
    /// Attached signature envelope, if signed.
    pub signature: Option<SignedMessage>,
    /// Delivery priority hint; higher is more urgent.
    pub priority: i32,
}

impl HasHeaders for Message {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

impl HasSignature for Message {
    fn signature(&self) -> Option<&SignedMessage> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signed: Option<SignedMessage>) {
        self.signature = signed;
    }
}

impl HasPriority for Message {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }
}

impl Message {
    /// Whether a feature toggle is present and truthy.
    #[must_use]
    pub fn has_feature(&self, name: &str) -> bool {
        matches!(self.features.get(name), Some(v) if v.as_bool().unwrap_or(true))
    }
}

/// Builder for [`Message`].
///
/// ```
/// use conduit_core::{MessageBuilder, MessageKind};
///
/// let msg = MessageBuilder::new("OrderCreated", MessageKind::Action)
///     .header("Authorization", "Bearer abc")
///     .build();
/// assert_eq!(msg.message_type, "OrderCreated");
/// ```
pub struct MessageBuilder {
    message_type: String,
    kind: MessageKind,
    correlation_id: Option<String>,
    headers: Headers,
    body: Vec<u8>,
    features: BTreeMap<String, serde_json::Value>,
    priority: i32,
}

impl MessageBuilder {
    /// Create a new builder for the given logical message type and kind.
    #[must_use]
    pub fn new(message_type: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            message_type: message_type.into(),
            kind,
            correlation_id: None,
            headers: Headers::new(),
            body: Vec::new(),
            features: BTreeMap::new(),
            priority: 0,
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the opaque body payload.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Toggle a feature flag.
    #[must_use]
    pub fn feature(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.features.insert(name.into(), v);
        }
        self
    }

    /// Set the delivery priority hint.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Finalize the message, assigning a fresh id and the current
    /// timestamp.
    #[must_use]
    pub fn build(self) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id,
            timestamp: Utc::now(),
            kind: self.kind,
            message_type: self.message_type,
            headers: self.headers,
            body: self.body,
            features: self.features,
            signature: None,
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_matches_expected_kinds() {
        let mask = MessageKindMask::action_and_event();
        assert!(mask.contains(MessageKind::Action));
        assert!(mask.contains(MessageKind::Event));
        assert!(!mask.contains(MessageKind::Query));
    }

    #[test]
    fn mask_all_matches_every_kind() {
        assert!(MessageKindMask::ALL.contains(MessageKind::Action));
        assert!(MessageKindMask::ALL.contains(MessageKind::Event));
        assert!(MessageKindMask::ALL.contains(MessageKind::Query));
    }

    #[test]
    fn mask_none_matches_nothing() {
        assert!(!MessageKindMask::NONE.contains(MessageKind::Action));
    }

    #[test]
    fn headers_are_case_sensitive_and_ordered() {
        let mut h = Headers::new();
        h.insert("Authorization", "Bearer x");
        h.insert("authorization", "other");
        assert_eq!(h.get("Authorization"), Some("Bearer x"));
        assert_eq!(h.get("authorization"), Some("other"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn headers_insert_replaces_existing_name() {
        let mut h = Headers::new();
        h.insert("X", "1");
        h.insert("X", "2");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("X"), Some("2"));
    }

    #[test]
    fn builder_produces_fresh_ids() {
        let a = MessageBuilder::new("T", MessageKind::Event).build();
        let b = MessageBuilder::new("T", MessageKind::Event).build();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn builder_bearer_header_round_trips() {
        let msg = MessageBuilder::new("T", MessageKind::Action)
            .header("Authorization", "Bearer tok")
            .build();
        assert_eq!(msg.headers().get("Authorization"), Some("Bearer tok"));
    }

    #[test]
    fn has_feature_defaults_to_false_when_absent() {
        let msg = MessageBuilder::new("T", MessageKind::Action).build();
        assert!(!msg.has_feature("anything"));
    }

    #[test]
    fn has_feature_true_for_truthy_non_bool_value() {
        let msg = MessageBuilder::new("T", MessageKind::Action)
            .feature("trace_id", "abc")
            .build();
        assert!(msg.has_feature("trace_id"));
    }
}
