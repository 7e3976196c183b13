// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-signing
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! HMAC message signing middleware: signs outgoing dispatch results and
//! verifies incoming signatures in constant time, with a zeroizing
//! in-process key cache.

/// Algorithm/format configuration and per-tenant overrides.
pub mod config;
/// Key resolution and the zeroizing key cache.
pub mod keys;
/// HMAC computation, encoding, and constant-time verification.
pub mod sign;

/// The `SigningMiddleware` itself.
pub mod middleware;

pub use config::SigningConfig;
pub use keys::{KeyCache, KeyProvider, StaticKeyProvider};
pub use middleware::SigningMiddleware;
