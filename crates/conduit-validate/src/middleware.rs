// SPDX-License-Identifier: MIT OR Apache-2.0
//! The input validation middleware.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{
    AuditEvent, AuditEventType, DispatchResult, HasHeaders, Message, MessageContext,
    NullSecurityEventSink, SecurityEventSink, Severity, ValidationError,
};
use conduit_middleware::{Middleware, Next, Stage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::custom::{ValidationReport, Validator};
use crate::patterns::{has_control_characters, ALL_INJECTION_KINDS};

/// Configuration for [`ValidationMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Master on/off switch; when `false` every message passes through.
    pub enabled: bool,
    /// Reject recognized SQL injection patterns.
    pub check_sql_injection: bool,
    /// Reject recognized NoSQL operator injection patterns.
    pub check_nosql_injection: bool,
    /// Reject recognized shell/command injection patterns.
    pub check_command_injection: bool,
    /// Reject recognized LDAP filter injection patterns.
    pub check_ldap_injection: bool,
    /// Reject path traversal sequences.
    pub check_path_traversal: bool,
    /// Reject HTML/script injection patterns.
    pub check_html_injection: bool,
    /// Reject control characters (excluding `\n`, `\r`, `\t`).
    pub check_control_characters: bool,
    /// Maximum length, in characters, for any single string field.
    pub max_string_length: Option<usize>,
    /// Maximum size, in bytes, of the message body.
    pub max_message_size_bytes: Option<usize>,
    /// When `true`, a missing correlation id fails validation.
    pub require_correlation_id: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_sql_injection: true,
            check_nosql_injection: true,
            check_command_injection: true,
            check_ldap_injection: true,
            check_path_traversal: true,
            check_html_injection: true,
            check_control_characters: true,
            max_string_length: None,
            max_message_size_bytes: None,
            require_correlation_id: false,
        }
    }
}

impl ValidationConfig {
    /// The default configuration (every built-in check enabled, no size
    /// limits, correlation id optional).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the middleware entirely.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Enforce a maximum per-field string length.
    #[must_use]
    pub fn max_string_length(mut self, len: usize) -> Self {
        self.max_string_length = Some(len);
        self
    }

    /// Enforce a maximum message body size in bytes.
    #[must_use]
    pub fn max_message_size_bytes(mut self, bytes: usize) -> Self {
        self.max_message_size_bytes = Some(bytes);
        self
    }

    /// Require every message to carry a correlation id.
    #[must_use]
    pub fn require_correlation_id(mut self) -> Self {
        self.require_correlation_id = true;
        self
    }
}

fn check_field(field: &str, value: &str, config: &ValidationConfig, report: &mut ValidationReport) {
    for kind in ALL_INJECTION_KINDS {
        let enabled = match kind {
            crate::patterns::InjectionKind::Sql => config.check_sql_injection,
            crate::patterns::InjectionKind::NoSql => config.check_nosql_injection,
            crate::patterns::InjectionKind::Command => config.check_command_injection,
            crate::patterns::InjectionKind::Ldap => config.check_ldap_injection,
            crate::patterns::InjectionKind::PathTraversal => config.check_path_traversal,
            crate::patterns::InjectionKind::Html => config.check_html_injection,
        };
        if enabled && kind.matches(value) {
            report.push(ValidationError {
                field: Some(field.to_string()),
                rule: kind.rule_name().to_string(),
                message: format!("{field} matched a recognized injection pattern"),
            });
        }
    }

    if config.check_control_characters && has_control_characters(value) {
        report.push(ValidationError {
            field: Some(field.to_string()),
            rule: "control_characters".to_string(),
            message: format!("{field} contains a control character"),
        });
    }

    if let Some(max) = config.max_string_length {
        if value.chars().count() > max {
            report.push(ValidationError {
                field: Some(field.to_string()),
                rule: "max_string_length".to_string(),
                message: format!("{field} exceeds the maximum length of {max}"),
            });
        }
    }
}

/// Runs built-in injection/control-character/size checks plus an ordered
/// custom-validator chain.
pub struct ValidationMiddleware {
    config: ValidationConfig,
    validators: Vec<Arc<dyn Validator>>,
    audit: Arc<dyn SecurityEventSink>,
}

impl ValidationMiddleware {
    /// Build a middleware from `config` with no custom validators and no
    /// audit sink wired up.
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            validators: Vec::new(),
            audit: Arc::new(NullSecurityEventSink),
        }
    }

    /// Append a custom validator (builder-style, preserves registration
    /// order).
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Attach a security event sink; failures are reported to it.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.audit = sink;
        self
    }

    fn run_built_in_checks(&self, message: &Message, report: &mut ValidationReport) {
        for (name, value) in message.headers().iter() {
            check_field(name, value, &self.config, report);
        }
        if let Ok(body) = std::str::from_utf8(&message.body) {
            check_field("body", body, &self.config, report);
        }
        if let Some(max) = self.config.max_message_size_bytes {
            if message.body.len() > max {
                report.push(ValidationError {
                    field: Some("body".to_string()),
                    rule: "max_message_size_bytes".to_string(),
                    message: format!("message body exceeds the maximum size of {max} bytes"),
                });
            }
        }
        if self.config.require_correlation_id && message.correlation_id.is_none() {
            report.push(ValidationError {
                field: Some("correlation_id".to_string()),
                rule: "require_correlation_id".to_string(),
                message: "message is missing a correlation id".to_string(),
            });
        }
    }

    async fn emit(&self, description: &str, severity: Severity, context: &MessageContext) {
        let mut event = AuditEvent::new(AuditEventType::ValidationFailure, severity, description);
        event.correlation_id = context.correlation_id.clone();
        self.audit.record(event).await;
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn name(&self) -> &str {
        "input-validation"
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        if !self.config.enabled {
            return next.call(message, context).await;
        }

        let mut report = ValidationReport::new();
        self.run_built_in_checks(message, &mut report);

        for validator in &self.validators {
            if let Err(errors) = validator.validate(message, context).await {
                debug!(target: "conduit.validate", validator = validator.name(), count = errors.len(), "custom validator rejected message");
                report.extend(errors);
            }
        }

        if report.is_valid() {
            return next.call(message, context).await;
        }

        let has_injection = report
            .errors()
            .iter()
            .any(|e| e.rule.ends_with("_injection"));
        let severity = if has_injection {
            Severity::Critical
        } else {
            Severity::Medium
        };
        let event_type = if has_injection {
            AuditEventType::InjectionAttempt
        } else {
            AuditEventType::ValidationFailure
        };
        let mut event = AuditEvent::new(event_type, severity, format!("validation failed: {report}"));
        event.correlation_id = context.correlation_id.clone();
        self.audit.record(event).await;

        DispatchResult::InputValidationFailed {
            errors: report.into_errors(),
        }
    }
}
