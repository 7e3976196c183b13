// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-audit
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The async security event logger: middleware enqueue `AuditEvent`s
//! without blocking; a single background consumer drains them in
//! micro-batches into a pluggable store, optionally forwarding to a
//! remote exporter.

/// Context-derived field extraction rules.
pub mod context;
/// Optional remote-forwarding of drained batches.
pub mod exporter;
/// The logger itself: queue, consumer, lifecycle.
pub mod logger;
/// Persistence backends.
pub mod store;

pub use context::enrich_from_context;
pub use exporter::{AuditExporter, JsonAuditExporter};
pub use logger::{SecurityEventLogger, SecurityEventLoggerConfig};
pub use store::{AuditStore, InMemoryAuditStore, NullAuditStore};
