// SPDX-License-Identifier: MIT OR Apache-2.0
//! JWT authentication middleware configuration.

use std::collections::BTreeSet;

/// The signing key material used to validate tokens when no async
/// credential retrieval is configured.
#[derive(Debug, Clone)]
pub enum SigningKeyConfig {
    /// HMAC secret bytes (HS256).
    Hmac(Vec<u8>),
    /// RSA public key in PEM format (RS256).
    Rsa(String),
}

/// Configuration for [`crate::JwtAuthMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Master on/off switch; when `false` every message passes through.
    pub enabled: bool,
    /// When `true`, a missing token is an authentication failure. When
    /// `false`, a missing token passes through without a principal.
    pub require_authentication: bool,
    /// `context.items` key holding a raw token, checked before headers.
    pub token_context_key: String,
    /// Header name carrying a (possibly `"Bearer "`-prefixed) token.
    pub token_header_name: String,
    /// Expected `iss` claim, if enforced.
    pub issuer: Option<String>,
    /// Expected `aud` claim, if enforced.
    pub audience: Option<String>,
    /// Leeway applied to expiration/not-before checks.
    pub clock_skew_seconds: u64,
    /// Static signing key used unless async retrieval is configured.
    pub signing_key: SigningKeyConfig,
    /// Whether to fetch the key from a `CredentialStore` instead of using
    /// `signing_key` directly.
    pub use_async_key_retrieval: bool,
    /// Credential name passed to the `CredentialStore`.
    pub credential_name: Option<String>,
    /// How long a fetched credential is cached before being refetched.
    pub credential_cache_ttl_seconds: u64,
    /// Message types exempted from authentication entirely.
    pub anonymous_message_types: BTreeSet<String>,
}

impl AuthConfig {
    /// A config using `signing_key` with authentication required and a
    /// 300-second clock skew allowance.
    #[must_use]
    pub fn new(signing_key: SigningKeyConfig) -> Self {
        Self {
            enabled: true,
            require_authentication: true,
            token_context_key: "AuthToken".to_string(),
            token_header_name: "Authorization".to_string(),
            issuer: None,
            audience: None,
            clock_skew_seconds: 300,
            signing_key,
            use_async_key_retrieval: false,
            credential_name: None,
            credential_cache_ttl_seconds: 300,
            anonymous_message_types: BTreeSet::new(),
        }
    }

    /// Disable the middleware; messages pass through unmodified.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Allow messages through without a token.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.require_authentication = false;
        self
    }

    /// Enforce the given issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Enforce the given audience.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Exempt `message_type` from authentication.
    #[must_use]
    pub fn anonymous_type(mut self, message_type: impl Into<String>) -> Self {
        self.anonymous_message_types.insert(message_type.into());
        self
    }

    /// Fetch the signing key from a `CredentialStore` by `credential_name`
    /// instead of using the static `signing_key`.
    #[must_use]
    pub fn async_key_retrieval(mut self, credential_name: impl Into<String>) -> Self {
        self.use_async_key_retrieval = true;
        self.credential_name = Some(credential_name.into());
        self
    }

    pub(crate) fn algorithm(&self) -> jsonwebtoken::Algorithm {
        match self.signing_key {
            SigningKeyConfig::Hmac(_) => jsonwebtoken::Algorithm::HS256,
            SigningKeyConfig::Rsa(_) => jsonwebtoken::Algorithm::RS256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_auth_with_300s_skew() {
        let cfg = AuthConfig::new(SigningKeyConfig::Hmac(b"secret".to_vec()));
        assert!(cfg.enabled);
        assert!(cfg.require_authentication);
        assert_eq!(cfg.clock_skew_seconds, 300);
        assert_eq!(cfg.token_context_key, "AuthToken");
    }

    #[test]
    fn anonymous_type_registers_exemption() {
        let cfg = AuthConfig::new(SigningKeyConfig::Hmac(b"s".to_vec())).anonymous_type("HealthCheck");
        assert!(cfg.anonymous_message_types.contains("HealthCheck"));
    }
}
