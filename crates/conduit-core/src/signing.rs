// SPDX-License-Identifier: MIT OR Apache-2.0
//! HMAC signing context and signed-message envelope shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HMAC algorithm used to sign a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignAlgorithm {
    /// HMAC with SHA-256.
    HmacSha256,
    /// HMAC with SHA-512.
    HmacSha512,
}

/// Text encoding used for the signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureFormat {
    /// Standard (non-URL-safe) base64.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
}

/// Configuration for a single sign or verify operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningContext {
    /// Which HMAC variant to use.
    pub algorithm: SignAlgorithm,
    /// How to encode the resulting signature bytes as text.
    pub format: SignatureFormat,
    /// Identifies which key the `KeyProvider` should return.
    pub key_id: Option<String>,
    /// Tenant the key is scoped to, if tenant-specific keys are in use.
    pub tenant_id: Option<String>,
    /// Free-form purpose string folded into key resolution.
    pub purpose: Option<String>,
    /// Whether to fold a timestamp into the canonical content before
    /// signing.
    pub include_timestamp: bool,
    /// Arbitrary metadata copied onto the resulting [`SignedMessage`].
    pub metadata: BTreeMap<String, Value>,
}

impl SigningContext {
    /// A context using the default algorithm (`HmacSha256`) and format
    /// (`Base64`) with no key scoping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: SignAlgorithm::HmacSha256,
            format: SignatureFormat::Base64,
            key_id: None,
            tenant_id: None,
            purpose: None,
            include_timestamp: true,
            metadata: BTreeMap::new(),
        }
    }
}

impl Default for SigningContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of signing a message: content, signature, and provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The canonical content that was signed.
    pub content: String,
    /// The computed signature, encoded per [`SigningContext::format`].
    pub signature: String,
    /// Which algorithm produced the signature.
    pub algorithm: SignAlgorithm,
    /// Which key produced the signature, if known.
    pub key_id: Option<String>,
    /// When the signature was computed.
    pub signed_at: DateTime<Utc>,
    /// Arbitrary metadata carried from the [`SigningContext`].
    pub metadata: BTreeMap<String, Value>,
}

impl SignedMessage {
    /// Whether this signature is stale relative to `now`, given
    /// `max_age_minutes`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_minutes: i64) -> bool {
        (now - self.signed_at).num_minutes() > max_age_minutes
    }
}
