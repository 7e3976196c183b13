// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-dispatch
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The top-level facade: a typed handler registry, a routing adapter for
//! [`conduit_middleware::Pipeline`], and the [`Dispatcher`] that ties
//! pipeline execution, retry/backoff, and dead-letter quarantine into the
//! single `dispatch`/`dispatch_query` entry point callers invoke.

/// The `Handler` trait and the typed registry dispatched messages are
/// resolved against.
pub mod handler;
/// The top-level `Dispatcher` and its builder.
pub mod dispatcher;
/// Adapts the routing engine into a pipeline middleware stage.
pub mod routing;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handler::{Handler, HandlerRegistry};
pub use routing::{RoutingMiddleware, PROPERTY_ROUTING_DECISION};
