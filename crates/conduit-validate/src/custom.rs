// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable custom validators and the validation report shape.

use async_trait::async_trait;
use conduit_core::{Message, MessageContext, ValidationError};

/// A custom, message-aware validation check registered alongside the
/// built-in ones.
///
/// Runs in registration order; the first failure does not stop later
/// validators from running — all failing validators' errors are merged
/// into the final [`ValidationReport`].
#[async_trait]
pub trait Validator: Send + Sync {
    /// Human-readable name used in tracing and error attribution.
    fn name(&self) -> &str;

    /// Validate `message`, returning `Ok(())` or the list of failures.
    async fn validate(&self, message: &Message, context: &MessageContext) -> Result<(), Vec<ValidationError>>;
}

/// One entry per failed check, collected across built-in and custom
/// validators.
///
/// [`std::fmt::Display`] renders the flat string list, while
/// [`ValidationReport::errors`] exposes the structured form.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// An empty (passing) report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Merge another report's errors into this one.
    pub fn extend(&mut self, other: Vec<ValidationError>) {
        self.errors.extend(other);
    }

    /// Whether no check failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The structured failure list.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Consume the report, returning the structured failure list.
    #[must_use]
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}
