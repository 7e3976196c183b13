// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audit event shape consumed by the security event logger.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a [`AuditEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine, expected event.
    Low,
    /// Worth reviewing but not urgent.
    Medium,
    /// Likely requires attention.
    High,
    /// Requires immediate attention.
    Critical,
}

/// The kind of security-relevant event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Authentication succeeded.
    AuthenticationSuccess,
    /// Authentication failed.
    AuthenticationFailure,
    /// Authorization denied an otherwise-authenticated principal.
    AuthorizationFailure,
    /// Input validation rejected a message.
    ValidationFailure,
    /// A validator detected a likely injection attempt.
    InjectionAttempt,
    /// The rate limiter denied a permit.
    RateLimitExceeded,
    /// Message signing failed.
    EncryptionFailure,
    /// Message signature verification failed.
    DecryptionFailure,
    /// A runtime configuration value changed.
    ConfigurationChange,
    /// A signing or credential key was rotated.
    CredentialRotation,
    /// A pattern matched a heuristic for suspicious activity.
    SuspiciousActivity,
}

/// An immutable-after-enqueue security audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier assigned at enqueue.
    pub id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The kind of event.
    pub event_type: AuditEventType,
    /// How severe the event is.
    pub severity: Severity,
    /// Human-readable description.
    pub description: String,
    /// Correlation id, if extractable from the dispatch context.
    pub correlation_id: Option<String>,
    /// Authenticated user id, if known.
    pub user_id: Option<String>,
    /// Source IP address, if known.
    pub source_ip: Option<String>,
    /// User agent string, if known.
    pub user_agent: Option<String>,
    /// The dispatched message's logical type, if known.
    pub message_type: Option<String>,
    /// Additional data copied verbatim from context items with a
    /// `Security:`, `Auth:`, or `Validation:` prefix.
    pub additional_data: BTreeMap<String, Value>,
}

impl AuditEvent {
    /// Construct a new event with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        event_type: AuditEventType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            severity,
            description: description.into(),
            correlation_id: None,
            user_id: None,
            source_ip: None,
            user_agent: None,
            message_type: None,
            additional_data: BTreeMap::new(),
        }
    }
}

/// A sink security-relevant middleware enqueue events into.
///
/// Implemented by the security event logger (`conduit-audit`); defined
/// here so that middleware crates (auth, validation, rate limiting,
/// signing) can emit audit events without depending on the logger crate
/// directly.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Enqueue `event` without blocking the caller.
    async fn record(&self, event: AuditEvent);
}

/// A sink that discards every event; the default when no logger is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSecurityEventSink;

#[async_trait]
impl SecurityEventSink for NullSecurityEventSink {
    async fn record(&self, _event: AuditEvent) {}
}
