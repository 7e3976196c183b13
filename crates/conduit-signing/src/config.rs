// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signing middleware configuration: algorithm/format defaults, per-tenant
//! overrides, and verification policy.

use std::collections::BTreeMap;

use conduit_core::{SignAlgorithm, SignatureFormat};

/// Configuration for [`crate::middleware::SigningMiddleware`].
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Master on/off switch.
    pub enabled: bool,
    /// HMAC variant used when no tenant override applies.
    pub default_algorithm: SignAlgorithm,
    /// Text encoding applied to signature bytes.
    pub format: SignatureFormat,
    /// Algorithm overrides keyed by tenant id.
    pub tenant_algorithms: BTreeMap<String, SignAlgorithm>,
    /// Key identifier passed to the `KeyProvider`.
    pub key_id: Option<String>,
    /// Free-form purpose string folded into key resolution.
    pub purpose: Option<String>,
    /// When `true`, an incoming message with no signature attached fails
    /// verification instead of passing through.
    pub require_valid_signature: bool,
    /// A verified signature older than this is treated as stale and fails
    /// verification.
    pub max_signature_age_minutes: i64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_algorithm: SignAlgorithm::HmacSha256,
            format: SignatureFormat::Base64,
            tenant_algorithms: BTreeMap::new(),
            key_id: None,
            purpose: None,
            require_valid_signature: false,
            max_signature_age_minutes: 5,
        }
    }
}

impl SigningConfig {
    /// Defaults: HMAC-SHA256, base64, no tenant overrides, signatures
    /// optional on the way in, stale after 5 minutes.
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

    /// Reject incoming messages that carry no signature.
    #[must_use]
    pub fn require_valid_signature(mut self) -> Self {
        self.require_valid_signature = true;
        self
    }

    /// Override the algorithm for a specific tenant.
    #[must_use]
    pub fn tenant_algorithm(mut self, tenant_id: impl Into<String>, algorithm: SignAlgorithm) -> Self {
        self.tenant_algorithms.insert(tenant_id.into(), algorithm);
        self
    }

    /// Set the key identifier passed to the `KeyProvider`.
    #[must_use]
    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// The algorithm to use for `tenant_id`, falling back to
    /// [`SigningConfig::default_algorithm`] when no override matches.
    #[must_use]
    pub fn algorithm_for(&self, tenant_id: Option<&str>) -> SignAlgorithm {
        tenant_id
            .and_then(|t| self.tenant_algorithms.get(t))
            .copied()
            .unwrap_or(self.default_algorithm)
    }
}
