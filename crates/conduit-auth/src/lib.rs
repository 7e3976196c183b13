// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-auth
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! JWT bearer-token authentication as a pipeline middleware: token
//! extraction, signature/issuer/audience/expiry validation, claims-to-
//! context mapping, and anonymous-route bypass.

/// Decoded JWT claims and role-claim merging.
pub mod claims;
/// Middleware configuration.
pub mod config;
/// Async credential retrieval and caching.
pub mod credential;
/// The `JwtAuthMiddleware` itself.
pub mod middleware;

pub use claims::{Claims, RoleClaim, ROLE_CLAIM_URI};
pub use config::{AuthConfig, SigningKeyConfig};
pub use credential::{CredentialStore, StaticCredentialStore};
pub use middleware::JwtAuthMiddleware;
