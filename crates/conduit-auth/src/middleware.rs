// SPDX-License-Identifier: MIT OR Apache-2.0
//! The JWT authentication middleware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use conduit_core::{
    AuditEvent, AuditEventType, AuthFailureReason, DispatchResult, HasHeaders, Message,
    MessageContext, MessageKindMask, NullSecurityEventSink, SecurityEventSink, Severity,
};
use conduit_middleware::{Middleware, Next, Stage};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::warn;

use crate::claims::Claims;
use crate::config::{AuthConfig, SigningKeyConfig};
use crate::credential::{CredentialStore, KeyCache};

/// Validates a bearer token and populates the authenticated principal in
/// `context.properties`.
pub struct JwtAuthMiddleware {
    config: AuthConfig,
    credential_store: Option<Arc<dyn CredentialStore>>,
    key_cache: KeyCache,
    audit: Arc<dyn SecurityEventSink>,
}

impl JwtAuthMiddleware {
    /// Build a middleware from `config`, with no credential store and no
    /// audit sink wired up.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            credential_store: None,
            key_cache: KeyCache::new(),
            audit: Arc::new(NullSecurityEventSink),
        }
    }

    /// Attach a `CredentialStore` for async key retrieval.
    #[must_use]
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Attach a security event sink; failures and successes are reported
    /// to it.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.audit = sink;
        self
    }

    async fn decoding_key(&self) -> Result<DecodingKey, AuthFailureReason> {
        if self.config.use_async_key_retrieval {
            let name = self
                .config
                .credential_name
                .as_deref()
                .ok_or(AuthFailureReason::UnknownError)?;
            let store = self.credential_store.as_deref().ok_or(AuthFailureReason::UnknownError)?;
            let ttl = Duration::from_secs(self.config.credential_cache_ttl_seconds);
            let bytes = self
                .key_cache
                .get_or_fetch(store, name, ttl)
                .await
                .ok_or(AuthFailureReason::UnknownError)?;
            return Ok(DecodingKey::from_secret(&bytes));
        }
        match &self.config.signing_key {
            SigningKeyConfig::Hmac(secret) => Ok(DecodingKey::from_secret(secret)),
            SigningKeyConfig::Rsa(pem) => {
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|_| AuthFailureReason::UnknownError)
            }
        }
    }

    fn extract_token(&self, message: &Message, context: &MessageContext) -> Option<String> {
        if let Some(token) = context.item_str(&self.config.token_context_key) {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        let header = message.headers().get(&self.config.token_header_name)?;
        Some(header.strip_prefix("Bearer ").unwrap_or(header).to_string())
    }

    async fn emit(
        &self,
        event_type: AuditEventType,
        severity: Severity,
        description: &str,
        context: &MessageContext,
        user_id: Option<String>,
    ) {
        let mut event = AuditEvent::new(event_type, severity, description);
        event.correlation_id = context.correlation_id.clone();
        event.user_id = user_id;
        self.audit.record(event).await;
    }

    fn apply_claims(&self, context: &mut MessageContext, claims: &Claims) {
        if let Some(sub) = &claims.sub {
            context.set_property("UserId", sub);
        }
        if let Some(name) = &claims.name {
            context.set_property("UserName", name);
        }
        if let Some(email) = &claims.email {
            context.set_property("Email", email);
        }
        if let Some(tenant_id) = &claims.tenant_id {
            context.set_property("TenantId", tenant_id);
            context.tenant_id = Some(tenant_id.clone());
        }
        let roles = claims.roles();
        if !roles.is_empty() {
            context.set_property("Roles", &roles);
        }
        context.set_property("Principal", claims);
        context.set_property("AuthenticatedAt", Utc::now().to_rfc3339());
        let method = claims.amr.as_ref().and_then(|m| m.first()).cloned().unwrap_or_else(|| "jwt".to_string());
        context.set_property("AuthenticationMethod", method);
    }
}

/// Best-effort `sub` claim extraction from the unverified token payload,
/// used only to attribute a failure audit event — never for authorization
/// decisions, since the signature has not (or has not yet) been checked.
fn peek_subject(token: &str) -> Option<String> {
    use base64::Engine as _;
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("sub")?.as_str().map(str::to_owned)
}

fn map_error(kind: &jsonwebtoken::errors::ErrorKind) -> AuthFailureReason {
    use jsonwebtoken::errors::ErrorKind;
    match kind {
        ErrorKind::ExpiredSignature => AuthFailureReason::TokenExpired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
            AuthFailureReason::ValidationError
        }
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthFailureReason::InvalidToken
        }
        _ => AuthFailureReason::UnknownError,
    }
}

#[async_trait]
impl Middleware for JwtAuthMiddleware {
    fn stage(&self) -> Stage {
        Stage::Authentication
    }

    fn applicable_kinds(&self) -> MessageKindMask {
        MessageKindMask::action_and_event()
    }

    fn name(&self) -> &str {
        "jwt-auth"
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        if !self.config.enabled || self.config.anonymous_message_types.contains(&message.message_type) {
            return next.call(message, context).await;
        }

        let token = match self.extract_token(message, context) {
            Some(t) => t,
            None => {
                if self.config.require_authentication {
                    self.emit(
                        AuditEventType::AuthenticationFailure,
                        Severity::High,
                        "no bearer token present",
                        context,
                        None,
                    )
                    .await;
                    return DispatchResult::AuthenticationFailed {
                        reason: AuthFailureReason::MissingToken,
                    };
                }
                return next.call(message, context).await;
            }
        };

        let decoding_key = match self.decoding_key().await {
            Ok(key) => key,
            Err(reason) => {
                warn!(target: "conduit.auth", ?reason, "signing key unavailable");
                self.emit(
                    AuditEventType::AuthenticationFailure,
                    Severity::High,
                    "signing key unavailable",
                    context,
                    peek_subject(&token),
                )
                .await;
                return DispatchResult::AuthenticationFailed { reason };
            }
        };

        let mut validation = Validation::new(self.config.algorithm());
        validation.leeway = self.config.clock_skew_seconds;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }

        match decode::<Claims>(&token, &decoding_key, &validation) {
            Ok(data) => {
                self.apply_claims(context, &data.claims);
                self.emit(
                    AuditEventType::AuthenticationSuccess,
                    Severity::Low,
                    "token validated",
                    context,
                    data.claims.sub.clone(),
                )
                .await;
                next.call(message, context).await
            }
            Err(err) => {
                let reason = map_error(err.kind());
                self.emit(
                    AuditEventType::AuthenticationFailure,
                    Severity::High,
                    &format!("token validation failed: {err}"),
                    context,
                    peek_subject(&token),
                )
                .await;
                DispatchResult::AuthenticationFailed { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::MessageBuilder;
    use conduit_middleware::{BoxFuture, CancellationToken, Pipeline, PipelineBuilder};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_with(claims: &serde_json::Value, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    async fn run(pipeline: &Pipeline, message: &mut Message, context: &mut MessageContext) -> DispatchResult {
        pipeline
            .dispatch(message, context, CancellationToken::new(), |_, _| {
                Box::pin(async { DispatchResult::ok() }) as BoxFuture<'_, DispatchResult>
            })
            .await
    }

    #[tokio::test]
    async fn valid_token_populates_principal_and_succeeds() {
        let secret = b"top-secret-signing-key".to_vec();
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let claims = serde_json::json!({
            "sub": "user-1",
            "email": "user@example.com",
            "tenant_id": "acme",
            "role": "admin",
            "exp": exp,
        });
        let token = token_with(&claims, &secret);

        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(secret)));
        let pipeline = PipelineBuilder::new().middleware(mw).build();

        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());

        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(result.succeeded());
        assert_eq!(context.property_str("UserId"), Some("user-1"));
        assert_eq!(context.property_str("Email"), Some("user@example.com"));
        assert_eq!(context.property_str("TenantId"), Some("acme"));
        assert_eq!(context.tenant_id.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn missing_required_token_fails_without_calling_next() {
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(b"s".to_vec())));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(matches!(
            result,
            DispatchResult::AuthenticationFailed { reason: AuthFailureReason::MissingToken }
        ));
    }

    #[tokio::test]
    async fn optional_auth_passes_through_without_token() {
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(b"s".to_vec())).optional());
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn expired_token_yields_token_expired() {
        let secret = b"secret".to_vec();
        let claims = serde_json::json!({"sub": "u", "exp": 0});
        let token = token_with(&claims, &secret);
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(secret)));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(matches!(
            result,
            DispatchResult::AuthenticationFailed { reason: AuthFailureReason::TokenExpired }
        ));
    }

    struct CapturingSink(std::sync::Mutex<Vec<AuditEvent>>);

    #[async_trait]
    impl conduit_core::SecurityEventSink for CapturingSink {
        async fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn expired_token_audit_event_attributes_the_unverified_subject() {
        let secret = b"secret".to_vec();
        let claims = serde_json::json!({"sub": "u1", "exp": 0});
        let token = token_with(&claims, &secret);
        let sink = Arc::new(CapturingSink(std::sync::Mutex::new(Vec::new())));
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(secret)))
            .with_audit_sink(sink.clone());
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());
        run(&pipeline, &mut message, &mut context).await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AuthenticationFailure);
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(events[0].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn wrong_signing_key_yields_validation_error() {
        let claims = serde_json::json!({"sub": "u", "exp": (Utc::now() + chrono::Duration::hours(1)).timestamp()});
        let token = token_with(&claims, b"correct-key");
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(b"wrong-key".to_vec())));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(matches!(
            result,
            DispatchResult::AuthenticationFailed { reason: AuthFailureReason::ValidationError }
        ));
    }

    #[tokio::test]
    async fn tid_short_name_claim_does_not_populate_tenant_id() {
        let secret = b"secret".to_vec();
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let claims = serde_json::json!({"sub": "u", "tid": "short-name-tenant", "exp": exp});
        let token = token_with(&claims, &secret);
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(secret)));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(result.succeeded());
        assert_eq!(context.property_str("TenantId"), None);
        assert_eq!(context.tenant_id, None);
    }

    #[tokio::test]
    async fn amr_claim_overrides_default_authentication_method() {
        let secret = b"secret".to_vec();
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let claims = serde_json::json!({"sub": "u", "amr": ["mfa"], "exp": exp});
        let token = token_with(&claims, &secret);
        let mw = JwtAuthMiddleware::new(AuthConfig::new(SigningKeyConfig::Hmac(secret)));
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("T", conduit_core::MessageKind::Action)
            .header("Authorization", format!("Bearer {token}"))
            .build();
        let mut context = MessageContext::new(message.id.clone());
        run(&pipeline, &mut message, &mut context).await;
        assert_eq!(context.property_str("AuthenticationMethod"), Some("mfa"));
    }

    #[tokio::test]
    async fn anonymous_message_type_bypasses_validation_entirely() {
        let mw = JwtAuthMiddleware::new(
            AuthConfig::new(SigningKeyConfig::Hmac(b"s".to_vec())).anonymous_type("HealthCheck"),
        );
        let pipeline = PipelineBuilder::new().middleware(mw).build();
        let mut message = MessageBuilder::new("HealthCheck", conduit_core::MessageKind::Action).build();
        let mut context = MessageContext::new(message.id.clone());
        let result = run(&pipeline, &mut message, &mut context).await;
        assert!(result.succeeded());
    }
}
