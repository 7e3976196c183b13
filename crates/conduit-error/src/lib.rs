// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for Conduit.
//!
//! Every Conduit error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`ConduitError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to, following the error
/// taxonomy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Null/empty required arguments, invariant violations.
    Argument,
    /// JWT authentication failures.
    Authentication,
    /// Input validation failures.
    Validation,
    /// Rate-limiter denials.
    RateLimit,
    /// HMAC signing/verification failures.
    Signing,
    /// Handler invocation failures.
    Handler,
    /// Poison-message / dead-letter routing.
    DeadLetter,
    /// Cancellation token fired.
    Cancellation,
    /// DLQ or audit store unavailability.
    Store,
    /// Transport/endpoint resolution failures.
    Routing,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Argument => "argument",
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Signing => "signing",
            Self::Handler => "handler",
            Self::DeadLetter => "dead_letter",
            Self::Cancellation => "cancellation",
            Self::Store => "store",
            Self::Routing => "routing",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that does not
/// change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Argument --
    /// Null message/context/next delegate, or an empty required string.
    ArgumentInvalid,

    // -- Authentication (JWT) --
    /// No bearer token present and authentication is required.
    AuthMissingToken,
    /// Token is malformed, has a bad signature, or wrong issuer/audience.
    AuthInvalidToken,
    /// Token `exp` is in the past beyond the configured clock skew.
    AuthTokenExpired,
    /// Token failed structural/claims validation.
    AuthValidationError,
    /// Authentication failed for a reason not otherwise classified.
    AuthUnknownError,

    // -- Validation --
    /// Built-in or custom validator rejected the message.
    ValidationFailed,

    // -- Rate limiting --
    /// The rate limiter denied a permit.
    RateLimitExceeded,

    // -- Signing --
    /// Outgoing message could not be signed (key unavailable).
    SigningError,
    /// Incoming message signature failed verification.
    VerificationError,

    // -- Routing --
    /// No transport could be resolved for the message.
    RoutingFailed,

    // -- Handler --
    /// A handler raised an error during invocation.
    HandlerError,
    /// No handler is registered for the message's logical type.
    HandlerNotFound,

    // -- Dead letter --
    /// Poison detector verdict positive, or a non-transient handler error.
    PoisonMessage,

    // -- Cancellation --
    /// The dispatch's cancellation token fired.
    Cancelled,

    // -- Store --
    /// The DLQ or audit store raised an error.
    StoreUnavailable,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ArgumentInvalid => ErrorCategory::Argument,

            Self::AuthMissingToken
            | Self::AuthInvalidToken
            | Self::AuthTokenExpired
            | Self::AuthValidationError
            | Self::AuthUnknownError => ErrorCategory::Authentication,

            Self::ValidationFailed => ErrorCategory::Validation,

            Self::RateLimitExceeded => ErrorCategory::RateLimit,

            Self::SigningError | Self::VerificationError => ErrorCategory::Signing,

            Self::RoutingFailed => ErrorCategory::Routing,

            Self::HandlerError | Self::HandlerNotFound => ErrorCategory::Handler,

            Self::PoisonMessage => ErrorCategory::DeadLetter,

            Self::Cancelled => ErrorCategory::Cancellation,

            Self::StoreUnavailable => ErrorCategory::Store,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"AUTH_TOKEN_EXPIRED"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArgumentInvalid => "ARGUMENT_INVALID",
            Self::AuthMissingToken => "AUTH_MISSING_TOKEN",
            Self::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            Self::AuthTokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::AuthValidationError => "AUTH_VALIDATION_ERROR",
            Self::AuthUnknownError => "AUTH_UNKNOWN_ERROR",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::SigningError => "SIGNING_ERROR",
            Self::VerificationError => "VERIFICATION_ERROR",
            Self::RoutingFailed => "ROUTING_FAILED",
            Self::HandlerError => "HANDLER_ERROR",
            Self::HandlerNotFound => "HANDLER_NOT_FOUND",
            Self::PoisonMessage => "POISON_MESSAGE",
            Self::Cancelled => "CANCELLED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConduitError
// ---------------------------------------------------------------------------

/// Unified Conduit error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use conduit_error::{ConduitError, ErrorCode};
///
/// let err = ConduitError::new(ErrorCode::RateLimitExceeded, "bucket exhausted")
///     .with_context("key", "tenant:t1")
///     .with_context("retry_after_ms", 250);
/// ```
pub struct ConduitError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ConduitError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for ConduitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ConduitError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ConduitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConduitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ConduitError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConduitErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ConduitError> for ConduitErrorDto {
    fn from(err: &ConduitError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ConduitErrorDto> for ConduitError {
    fn from(dto: ConduitErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
