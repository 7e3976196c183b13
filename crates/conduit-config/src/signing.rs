// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for [`conduit_signing::SigningConfig`].

use std::collections::BTreeMap;

use conduit_core::{SignAlgorithm, SignatureFormat};
use conduit_signing::SigningConfig;
use serde::{Deserialize, Serialize};

/// Options for [`conduit_signing::SigningMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningOptions {
    /// Master on/off switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// HMAC variant used when no tenant override applies.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: SignAlgorithm,
    /// Text encoding applied to signature bytes.
    #[serde(default = "default_format")]
    pub format: SignatureFormat,
    /// Algorithm overrides keyed by tenant id.
    #[serde(default)]
    pub tenant_algorithms: BTreeMap<String, SignAlgorithm>,
    /// Key identifier passed to the `KeyProvider`.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Free-form purpose string folded into key resolution.
    #[serde(default)]
    pub purpose: Option<String>,
    /// When `true`, an incoming message with no signature attached fails
    /// verification instead of passing through.
    #[serde(default)]
    pub require_valid_signature: bool,
    /// A verified signature older than this is treated as stale and
    /// fails verification, in minutes.
    #[serde(default = "default_max_signature_age_minutes")]
    pub max_signature_age_minutes: i64,
}

fn default_true() -> bool {
    true
}
fn default_max_signature_age_minutes() -> i64 {
    5
}
fn default_algorithm() -> SignAlgorithm {
    SignAlgorithm::HmacSha256
}
fn default_format() -> SignatureFormat {
    SignatureFormat::Base64
}

impl Default for SigningOptions {
    fn default() -> Self {
        let config = SigningConfig::default();
        Self {
            enabled: config.enabled,
            default_algorithm: config.default_algorithm,
            format: config.format,
            tenant_algorithms: BTreeMap::new(),
            key_id: None,
            purpose: None,
            require_valid_signature: config.require_valid_signature,
            max_signature_age_minutes: config.max_signature_age_minutes,
        }
    }
}

impl SigningOptions {
    /// Build the typed [`SigningConfig`] this section describes.
    #[must_use]
    pub fn to_signing_config(&self) -> SigningConfig {
        SigningConfig {
            enabled: self.enabled,
            default_algorithm: self.default_algorithm,
            format: self.format,
            tenant_algorithms: self.tenant_algorithms.clone(),
            key_id: self.key_id.clone(),
            purpose: self.purpose.clone(),
            require_valid_signature: self.require_valid_signature,
            max_signature_age_minutes: self.max_signature_age_minutes,
        }
    }
}
