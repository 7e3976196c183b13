// SPDX-License-Identifier: MIT OR Apache-2.0
//! The polymorphic dispatch result type.

use conduit_error::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason a JWT authentication attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureReason {
    /// No bearer token was present and authentication was required.
    MissingToken,
    /// The token is malformed or has a bad signature.
    InvalidToken,
    /// The token's `exp` claim is in the past beyond the clock skew.
    TokenExpired,
    /// The token failed structural or claims validation (issuer, audience).
    ValidationError,
    /// Authentication failed for an unclassified reason.
    UnknownError,
}

impl AuthFailureReason {
    /// The [`ErrorCode`] this failure reason maps to.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::AuthMissingToken,
            Self::InvalidToken => ErrorCode::AuthInvalidToken,
            Self::TokenExpired => ErrorCode::AuthTokenExpired,
            Self::ValidationError => ErrorCode::AuthValidationError,
            Self::UnknownError => ErrorCode::AuthUnknownError,
        }
    }
}

/// One failed validation check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed, if the check is field-scoped.
    pub field: Option<String>,
    /// The name of the rule that rejected the value (e.g.
    /// `"max_string_length"`, `"sql_injection"`).
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {} ({})", self.message, self.rule),
            None => write!(f, "{} ({})", self.message, self.rule),
        }
    }
}

/// RFC-7807-flavored problem details attached to a plain [`DispatchResult::Failure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Short, human-readable summary.
    pub title: String,
    /// Longer explanation specific to this occurrence.
    pub detail: Option<String>,
    /// The error code this problem corresponds to.
    pub code: ErrorCode,
}

/// A polymorphic dispatch outcome.
///
/// Every variant exposes a boolean [`DispatchResult::succeeded`]. `T` is
/// the handler's success payload type (queries return a typed value;
/// actions and events typically use `()` or [`serde_json::Value`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchResult<T = Value> {
    /// The handler ran to completion.
    Success {
        /// The handler's return value, if any.
        value: Option<T>,
    },
    /// A generic, non-typed failure.
    Failure {
        /// Structured problem details.
        problem_details: ProblemDetails,
    },
    /// JWT authentication rejected the message.
    AuthenticationFailed {
        /// Why authentication failed.
        reason: AuthFailureReason,
    },
    /// The rate limiter denied a permit.
    RateLimitExceeded {
        /// Best-effort hint for how long the caller should wait.
        retry_after_ms: u64,
    },
    /// Input validation rejected the message.
    InputValidationFailed {
        /// One entry per failed check.
        errors: Vec<ValidationError>,
    },
    /// The dispatch's cancellation token fired before completion.
    Cancelled,
}

impl<T> DispatchResult<T> {
    /// Whether this result represents success.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Construct a bare success with no payload.
    #[must_use]
    pub fn ok() -> Self {
        Self::Success { value: None }
    }

    /// Construct a success carrying a payload.
    #[must_use]
    pub fn ok_with(value: T) -> Self {
        Self::Success { value: Some(value) }
    }
}
