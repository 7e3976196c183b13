// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-ratelimit
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Admission control middleware: token-bucket, sliding-window,
//! fixed-window, or concurrency limiting, keyed by tenant with a
//! zero-configuration global default.

/// Limiter algorithm selection and per-key override configuration.
pub mod config;
/// The four limiting algorithms and the keyed limiter cache.
pub mod limiter;
/// The `RateLimitMiddleware` itself.
pub mod middleware;

pub use config::{LimiterSpec, RateLimitConfig};
pub use limiter::{Decision, LimiterRegistry};
pub use middleware::RateLimitMiddleware;
