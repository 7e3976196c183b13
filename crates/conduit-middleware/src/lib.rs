// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-middleware
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The ordered pipeline that every dispatch runs through: rate limiting,
//! authentication, authorization, validation, telemetry, error handling,
//! and routing, each implemented as a [`Middleware`] and composed by a
//! [`Pipeline`].

/// Cancellation token threaded through a dispatch.
pub mod cancel;
/// Pipeline composition and the `Middleware` trait.
pub mod pipeline;

pub use cancel::CancellationToken;
pub use pipeline::{BoxFuture, HandlerFn, Middleware, Next, Pipeline, PipelineBuilder, Stage};
