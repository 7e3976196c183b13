// SPDX-License-Identifier: MIT OR Apache-2.0
//! HMAC computation, text encoding, and constant-time verification.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use conduit_core::{SignAlgorithm, SignatureFormat};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Compute the raw HMAC digest of `content` under `key` using `algorithm`.
fn digest(algorithm: SignAlgorithm, key: &[u8], content: &str) -> Vec<u8> {
    match algorithm {
        SignAlgorithm::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(content.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        SignAlgorithm::HmacSha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(content.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Compute and text-encode the signature over `content`.
#[must_use]
pub fn sign(algorithm: SignAlgorithm, format: SignatureFormat, key: &[u8], content: &str) -> String {
    let bytes = digest(algorithm, key, content);
    encode(format, &bytes)
}

fn encode(format: SignatureFormat, bytes: &[u8]) -> String {
    match format {
        SignatureFormat::Base64 => BASE64.encode(bytes),
        SignatureFormat::Hex => bytes.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

fn decode(format: SignatureFormat, text: &str) -> Option<Vec<u8>> {
    match format {
        SignatureFormat::Base64 => BASE64.decode(text).ok(),
        SignatureFormat::Hex => {
            if text.len() % 2 != 0 {
                return None;
            }
            (0..text.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
                .collect()
        }
    }
}

/// Recompute the expected signature over `content` and compare it against
/// `signature` in constant time. Returns `false` on any decode or key
/// mismatch without leaking timing differences between a bad encoding and
/// a bad digest.
#[must_use]
pub fn verify(algorithm: SignAlgorithm, format: SignatureFormat, key: &[u8], content: &str, signature: &str) -> bool {
    let Some(given) = decode(format, signature) else {
        return false;
    };
    let expected = digest(algorithm, key, content);
    given.ct_eq(&expected).into()
}
