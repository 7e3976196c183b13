// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable data model for the Conduit message dispatch runtime: the
//! message envelope, the per-invocation context, the polymorphic result
//! type, the routing decision shape, dead-letter entries, audit events, and
//! the signing context. If you only take one dependency from this
//! workspace, take this one.

/// Audit event shape consumed by the security event logger.
pub mod audit;
/// Canonical JSON serialization and content hashing.
pub mod canonical;
/// Mutable per-invocation dispatch context.
pub mod context;
/// Dead-letter queue entry and query filter shapes.
pub mod deadletter;
/// The immutable message envelope and its structural capabilities.
pub mod message;
/// The polymorphic dispatch result type.
pub mod result;
/// Routing decision and route descriptor shapes.
pub mod routing;
/// HMAC signing context and signed-message envelope.
pub mod signing;

pub use audit::{AuditEvent, AuditEventType, NullSecurityEventSink, SecurityEventSink, Severity};
pub use canonical::{canonical_json, sha256_hex};
pub use context::MessageContext;
pub use deadletter::{DeadLetterEntry, DeadLetterQueryFilter, DeadLetterReason};
pub use message::{
    HasHeaders, HasPriority, HasSignature, Message, MessageBuilder, MessageKind, MessageKindMask,
};
pub use result::{AuthFailureReason, DispatchResult, ProblemDetails, ValidationError};
pub use routing::{RouteDescriptor, RouteType, RoutingDecision};
pub use signing::{SignAlgorithm, SignatureFormat, SignedMessage, SigningContext};

/// Current contract version string embedded in diagnostics.
///
/// # Examples
///
/// ```
/// assert_eq!(conduit_core::CONTRACT_VERSION, "conduit/v0.1");
/// ```
pub const CONTRACT_VERSION: &str = "conduit/v0.1";
