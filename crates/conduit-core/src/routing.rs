// SPDX-License-Identifier: MIT OR Apache-2.0
//! Routing decision and route descriptor shapes shared between the core
//! data model and the routing engine crate.

use serde::{Deserialize, Serialize};

/// Whether a [`RouteDescriptor`] describes a transport selection or an
/// endpoint fan-out target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// A transport-selection route (e.g. `"rabbitmq"`, `"kafka"`, `"local"`).
    Transport,
    /// An endpoint fan-out route (e.g. `"billing-service"`).
    Endpoint,
}

/// A single route reported by `getAvailableRoutes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// Transport or endpoint name.
    pub name: String,
    /// Whether this is a transport or endpoint route.
    pub route_type: RouteType,
    /// Priority; monotonically assigned per rule (all endpoints of one
    /// rule share a priority). The fallback route uses `i32::MAX`.
    pub priority: i32,
    /// Zero-based registration index of the rule that produced this route.
    pub registration_index: usize,
}

/// Outcome of [routing a dispatched message](crate) to a transport and
/// endpoint set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// A transport and endpoint set were resolved.
    Success {
        /// The selected transport name.
        transport: String,
        /// The resolved endpoint fan-out set, in first-seen order.
        endpoints: Vec<String>,
        /// Rule labels that contributed to this decision, e.g.
        /// `"transport:rabbitmq"`, `"endpoint:billing-service"`.
        matched_rule_labels: Vec<String>,
    },
    /// No transport could be resolved.
    Failure {
        /// Why routing failed.
        reason: String,
    },
}

impl RoutingDecision {
    /// Whether routing succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
