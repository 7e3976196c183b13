// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dead-letter entry and query filter shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a message was routed to the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// The retry/backoff policy exhausted its attempt budget.
    MaxRetriesExceeded,
    /// A circuit breaker guarding the handler was open.
    CircuitBreakerOpen,
    /// The message body could not be deserialized.
    DeserializationFailed,
    /// No handler is registered for the message type.
    HandlerNotFound,
    /// Input validation rejected the message.
    ValidationFailed,
    /// An operator manually rejected the message.
    ManualRejection,
    /// The message's time-to-live elapsed before processing.
    MessageExpired,
    /// Authentication or authorization rejected the message.
    AuthorizationFailed,
    /// The handler raised an error that was not classified as transient.
    UnhandledException,
    /// A poison detector returned a positive verdict.
    PoisonMessage,
    /// Reason not otherwise classified.
    Unknown = 99,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MaxRetriesExceeded => "MaxRetriesExceeded",
            Self::CircuitBreakerOpen => "CircuitBreakerOpen",
            Self::DeserializationFailed => "DeserializationFailed",
            Self::HandlerNotFound => "HandlerNotFound",
            Self::ValidationFailed => "ValidationFailed",
            Self::ManualRejection => "ManualRejection",
            Self::MessageExpired => "MessageExpired",
            Self::AuthorizationFailed => "AuthorizationFailed",
            Self::UnhandledException => "UnhandledException",
            Self::PoisonMessage => "PoisonMessage",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An append-only dead-letter record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Unique identifier generated at enqueue.
    pub id: String,
    /// The original message's id.
    pub message_id: String,
    /// The original message's logical type.
    pub message_type: String,
    /// Serialized message body.
    pub message_body: Vec<u8>,
    /// Serialized message metadata (headers, features).
    pub message_metadata: String,
    /// Why the message was dead-lettered.
    pub reason: DeadLetterReason,
    /// Captured exception details, iff `CaptureExceptionDetails=true`.
    pub exception_details: Option<String>,
    /// How many times processing was attempted.
    pub processing_attempts: u32,
    /// When the first attempt occurred.
    pub first_attempt_at: Option<DateTime<Utc>>,
    /// When the most recent attempt occurred.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the entry was moved to the dead-letter queue.
    pub moved_to_dead_letter_at: DateTime<Utc>,
    /// Whether this entry has been replayed at least once.
    pub is_replayed: bool,
    /// When the entry was last replayed.
    pub replayed_at: Option<DateTime<Utc>>,
    /// The originating transport or queue name.
    pub source_system: Option<String>,
    /// The original message's correlation id.
    pub correlation_id: Option<String>,
    /// Arbitrary additional metadata.
    pub properties: BTreeMap<String, Value>,
}

/// Query filter for [`DeadLetterEntry`] lookups.
///
/// Factory constructors leave every other field `None`/unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadLetterQueryFilter {
    /// Restrict to a single message type.
    pub message_type: Option<String>,
    /// Restrict to a single dead-letter reason.
    pub reason: Option<DeadLetterReason>,
    /// Lower bound (inclusive) on `moved_to_dead_letter_at`.
    pub from_date: Option<DateTime<Utc>>,
    /// Upper bound (inclusive) on `moved_to_dead_letter_at`.
    pub to_date: Option<DateTime<Utc>>,
    /// Restrict to replayed or not-yet-replayed entries.
    pub is_replayed: Option<bool>,
    /// Restrict to a single originating source system.
    pub source_queue: Option<String>,
    /// Restrict to a single correlation id.
    pub correlation_id: Option<String>,
    /// Minimum `processing_attempts`.
    pub min_attempts: Option<u32>,
    /// Number of matching entries to skip (for pagination).
    pub skip: usize,
}

impl DeadLetterQueryFilter {
    /// An unfiltered query (everything, no skip).
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries that have not yet been replayed.
    #[must_use]
    pub fn pending_only() -> Self {
        Self {
            is_replayed: Some(false),
            ..Self::default()
        }
    }

    /// Entries that have already been replayed.
    #[must_use]
    pub fn replayed_only() -> Self {
        Self {
            is_replayed: Some(true),
            ..Self::default()
        }
    }

    /// Entries of a single message type.
    #[must_use]
    pub fn by_message_type(message_type: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type.into()),
            ..Self::default()
        }
    }

    /// Entries with a single dead-letter reason.
    #[must_use]
    pub fn by_reason(reason: DeadLetterReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::default()
        }
    }

    /// Whether `entry` matches this filter.
    #[must_use]
    pub fn matches(&self, entry: &DeadLetterEntry) -> bool {
        if let Some(ref mt) = self.message_type {
            if &entry.message_type != mt {
                return false;
            }
        }
        if let Some(reason) = self.reason {
            if entry.reason != reason {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if entry.moved_to_dead_letter_at < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if entry.moved_to_dead_letter_at > to {
                return false;
            }
        }
        if let Some(replayed) = self.is_replayed {
            if entry.is_replayed != replayed {
                return false;
            }
        }
        if let Some(ref src) = self.source_queue {
            if entry.source_system.as_deref() != Some(src.as_str()) {
                return false;
            }
        }
        if let Some(ref cid) = self.correlation_id {
            if entry.correlation_id.as_deref() != Some(cid.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_attempts {
            if entry.processing_attempts < min {
                return false;
            }
        }
        true
    }
}
