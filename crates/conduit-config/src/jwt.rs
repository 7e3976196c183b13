// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for [`conduit_auth::AuthConfig`].

use std::collections::BTreeSet;

use conduit_auth::{AuthConfig, SigningKeyConfig};
use serde::{Deserialize, Serialize};

/// The key material format carried in TOML. Exactly one of `hmac_secret` /
/// `rsa_public_key_pem` should be set; `hmac_secret` wins if both are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtOptions {
    /// Master on/off switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When `true`, a missing token is an authentication failure.
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    /// `context.items` key holding a raw token.
    #[serde(default = "default_token_context_key")]
    pub token_context_key: String,
    /// Header name carrying a (possibly `"Bearer "`-prefixed) token.
    #[serde(default = "default_token_header_name")]
    pub token_header_name: String,
    /// Expected `iss` claim, if enforced.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim, if enforced.
    #[serde(default)]
    pub audience: Option<String>,
    /// Leeway applied to expiration/not-before checks.
    #[serde(default = "default_clock_skew_seconds")]
    pub clock_skew_seconds: u64,
    /// HMAC secret, as a plain UTF-8 string. Selects HS256.
    #[serde(default)]
    pub hmac_secret: Option<String>,
    /// RSA public key in PEM format. Selects RS256 when `hmac_secret` is
    /// absent.
    #[serde(default)]
    pub rsa_public_key_pem: Option<String>,
    /// Whether to fetch the key from a `CredentialStore` instead of using
    /// the static key above.
    #[serde(default)]
    pub use_async_key_retrieval: bool,
    /// Credential name passed to the `CredentialStore`.
    #[serde(default)]
    pub credential_name: Option<String>,
    /// How long a fetched credential is cached before being refetched.
    #[serde(default = "default_credential_cache_ttl_seconds")]
    pub credential_cache_ttl_seconds: u64,
    /// Message types exempted from authentication entirely.
    #[serde(default)]
    pub anonymous_message_types: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}
fn default_token_context_key() -> String {
    "AuthToken".to_string()
}
fn default_token_header_name() -> String {
    "Authorization".to_string()
}
fn default_clock_skew_seconds() -> u64 {
    300
}
fn default_credential_cache_ttl_seconds() -> u64 {
    300
}

impl JwtOptions {
    /// Build the typed [`AuthConfig`] this section describes.
    ///
    /// Returns `None` when neither `hmac_secret` nor `rsa_public_key_pem`
    /// is set and async key retrieval is not configured either — there is
    /// no key material to authenticate with.
    #[must_use]
    pub fn to_auth_config(&self) -> Option<AuthConfig> {
        let signing_key = if let Some(secret) = &self.hmac_secret {
            SigningKeyConfig::Hmac(secret.as_bytes().to_vec())
        } else if let Some(pem) = &self.rsa_public_key_pem {
            SigningKeyConfig::Rsa(pem.clone())
        } else if self.use_async_key_retrieval {
            SigningKeyConfig::Hmac(Vec::new())
        } else {
            return None;
        };

        let mut config = AuthConfig::new(signing_key);
        config.enabled = self.enabled;
        config.require_authentication = self.require_authentication;
        config.token_context_key = self.token_context_key.clone();
        config.token_header_name = self.token_header_name.clone();
        config.issuer = self.issuer.clone();
        config.audience = self.audience.clone();
        config.clock_skew_seconds = self.clock_skew_seconds;
        config.use_async_key_retrieval = self.use_async_key_retrieval;
        config.credential_name = self.credential_name.clone();
        config.credential_cache_ttl_seconds = self.credential_cache_ttl_seconds;
        config.anonymous_message_types = self.anonymous_message_types.clone();
        Some(config)
    }
}
