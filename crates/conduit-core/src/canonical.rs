// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical JSON serialization and content hashing.
//!
//! A deterministic byte representation such that equal values produce
//! equal output — `serde_json::Value`'s object maps are backed by a
//! `BTreeMap` (via the `preserve_order` feature being unset), so key order
//! is already normalized to sorted order.

use conduit_error::{ConduitError, ErrorCode};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize `value` to its canonical (key-sorted, whitespace-free) JSON
/// string.
///
/// # Errors
///
/// Returns a [`ConduitError`] with [`ErrorCode::ArgumentInvalid`] if `value`
/// cannot be represented as JSON.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ConduitError> {
    let v = serde_json::to_value(value).map_err(|e| {
        ConduitError::new(ErrorCode::ArgumentInvalid, "failed to canonicalize value")
            .with_source(e)
    })?;
    serde_json::to_string(&v).map_err(|e| {
        ConduitError::new(ErrorCode::ArgumentInvalid, "failed to serialize canonical value")
            .with_source(e)
    })
}

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let v = serde_json::json!({"b": 1, "a": 2});
        let s = canonical_json(&v).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_json_is_deterministic_across_equal_values() {
        let a = serde_json::json!({"x": [1,2,3], "y": "z"});
        let b = serde_json::json!({"y": "z", "x": [1,2,3]});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn sha256_hex_is_stable_and_distinguishes_inputs() {
        let h1 = sha256_hex(b"hello");
        let h2 = sha256_hex(b"hello");
        let h3 = sha256_hex(b"hellO");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64);
    }
}
