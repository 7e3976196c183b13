// SPDX-License-Identifier: MIT OR Apache-2.0
//! The message signing middleware.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use conduit_core::context::{ITEM_MESSAGE_DIRECTION, ITEM_MESSAGE_SIGNATURE};
use conduit_core::{
    canonical_json, AuditEvent, AuditEventType, DispatchResult, Message, MessageContext,
    NullSecurityEventSink, ProblemDetails, SecurityEventSink, SignedMessage, Severity,
};
use conduit_error::ErrorCode;
use conduit_middleware::{Middleware, Next, Stage};
use tracing::warn;

use crate::config::SigningConfig;
use crate::keys::{KeyCache, KeyProvider};
use crate::sign;

/// Wraps `next`; on the way out it signs a successful result, on the way
/// in it verifies an attached signature before continuing.
///
/// Direction is read from `context.Items["MessageDirection"]`
/// (`"Outgoing"` or `"Incoming"`); any other value (including absent)
/// passes through unmodified.
pub struct SigningMiddleware {
    config: SigningConfig,
    key_provider: Arc<dyn KeyProvider>,
    cache: KeyCache,
    audit: Arc<dyn SecurityEventSink>,
}

impl SigningMiddleware {
    /// Build a middleware from `config` and `key_provider`, with no audit
    /// sink wired up.
    #[must_use]
    pub fn new(config: SigningConfig, key_provider: Arc<dyn KeyProvider>) -> Self {
        Self {
            config,
            key_provider,
            cache: KeyCache::new(),
            audit: Arc::new(NullSecurityEventSink),
        }
    }

    /// Attach a security event sink; signing and verification failures are
    /// reported to it.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Zero and drop all cached key material.
    pub async fn dispose(&self) {
        self.cache.clear().await;
    }

    async fn emit(&self, event_type: AuditEventType, severity: Severity, description: impl Into<String>, context: &MessageContext) {
        let mut event = AuditEvent::new(event_type, severity, description);
        event.correlation_id = context.correlation_id.clone();
        self.audit.record(event).await;
    }

    fn failure(&self, code: ErrorCode, detail: impl Into<String>) -> DispatchResult {
        DispatchResult::Failure {
            problem_details: ProblemDetails {
                title: "message signing failed".to_string(),
                detail: Some(detail.into()),
                code,
            },
        }
    }

    async fn sign_outgoing(&self, message: &Message, context: &mut MessageContext) -> Option<DispatchResult> {
        let algorithm = self.config.algorithm_for(context.tenant_id.as_deref());
        let key = self
            .cache
            .get_or_fetch(
                self.key_provider.as_ref(),
                self.config.key_id.as_deref(),
                self.config.purpose.as_deref(),
                context.tenant_id.as_deref(),
                false,
            )
            .await;
        let Some(key) = key else {
            self.emit(AuditEventType::EncryptionFailure, Severity::High, "signing key unavailable", context)
                .await;
            return Some(self.failure(ErrorCode::SigningError, "signing key unavailable"));
        };
        let content = match canonical_json(message) {
            Ok(c) => c,
            Err(err) => {
                self.emit(AuditEventType::EncryptionFailure, Severity::High, format!("canonicalization failed: {err}"), context)
                    .await;
                return Some(self.failure(ErrorCode::SigningError, "message could not be canonicalized"));
            }
        };
        let signature = sign::sign(algorithm, self.config.format, &key, &content);
        context.set_property("MessageSignature", &signature);
        context.set_property("SignatureAlgorithm", algorithm);
        context.set_property("SignedAt", Utc::now());
        None
    }

    async fn verify_incoming(&self, message: &Message, context: &MessageContext) -> Result<bool, String> {
        let Some(raw) = context.items.get(ITEM_MESSAGE_SIGNATURE) else {
            return Ok(!self.config.require_valid_signature);
        };
        let Ok(signed): Result<SignedMessage, _> = serde_json::from_value(raw.clone()) else {
            return Err("attached signature is malformed".to_string());
        };
        if signed.is_stale(Utc::now(), self.config.max_signature_age_minutes) {
            return Err("attached signature is stale".to_string());
        }
        let content = canonical_json(message).map_err(|e| e.to_string())?;

        for bypass_cache in [false, true] {
            let key = self
                .cache
                .get_or_fetch(
                    self.key_provider.as_ref(),
                    signed.key_id.as_deref().or(self.config.key_id.as_deref()),
                    self.config.purpose.as_deref(),
                    context.tenant_id.as_deref(),
                    bypass_cache,
                )
                .await;
            let Some(key) = key else {
                continue;
            };
            if sign::verify(signed.algorithm, self.config.format, &key, &content, &signed.signature) {
                return Ok(true);
            }
        }
        Err("signature verification failed".to_string())
    }
}

#[async_trait]
impl Middleware for SigningMiddleware {
    fn stage(&self) -> Stage {
        Stage::Custom
    }

    fn name(&self) -> &str {
        "message-signing"
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        if !self.config.enabled {
            return next.call(message, context).await;
        }

        match context.item_str(ITEM_MESSAGE_DIRECTION) {
            Some("Outgoing") => {
                let result = next.call(message, context).await;
                if !result.succeeded() {
                    return result;
                }
                if let Some(failure) = self.sign_outgoing(message, context).await {
                    return failure;
                }
                result
            }
            Some("Incoming") => match self.verify_incoming(message, context).await {
                Ok(true) => next.call(message, context).await,
                Ok(false) => self.failure(ErrorCode::VerificationError, "message is not signed"),
                Err(reason) => {
                    warn!(target: "conduit.signing", reason = %reason, "signature verification failed");
                    self.emit(AuditEventType::DecryptionFailure, Severity::High, reason.clone(), context).await;
                    self.failure(ErrorCode::VerificationError, reason)
                }
            },
            _ => next.call(message, context).await,
        }
    }
}
