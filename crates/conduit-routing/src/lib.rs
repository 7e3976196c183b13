// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-routing
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Transport selection and endpoint fan-out for dispatched messages, with
//! first-unconditional-match memoization.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::{Message, MessageContext, RouteDescriptor, RouteType, RoutingDecision};
use globset::{Glob, GlobMatcher};
use tokio::sync::Mutex;
use tracing::debug;

/// A predicate deciding whether a conditional rule applies, given the
/// message and its dispatch context.
pub type RoutePredicate = Arc<dyn Fn(&Message, &MessageContext) -> bool + Send + Sync>;

fn compile(pattern: &str) -> GlobMatcher {
    Glob::new(pattern)
        .unwrap_or_else(|_| Glob::new(&globset::escape(pattern)))
        .compile_matcher()
}

struct TransportRule {
    message_type: String,
    matcher: GlobMatcher,
    predicate: Option<RoutePredicate>,
    transport: String,
    registration_index: usize,
}

struct EndpointRule {
    message_type: String,
    matcher: GlobMatcher,
    predicate: Option<RoutePredicate>,
    endpoints: Vec<String>,
    registration_index: usize,
}

/// Builder assembling a [`Router`] in registration order.
///
/// A single monotonic counter is shared across transport and endpoint rules
/// so that [`Router::get_available_routes`] can assign priorities that
/// reflect true registration order regardless of rule kind.
pub struct RouterBuilder {
    transport_rules: Vec<TransportRule>,
    endpoint_rules: Vec<EndpointRule>,
    default_transport: String,
    fallback_endpoint: Option<String>,
    next_registration_index: usize,
}

impl RouterBuilder {
    /// A builder with no rules and `"default"` as the default transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport_rules: Vec::new(),
            endpoint_rules: Vec::new(),
            default_transport: "default".to_string(),
            fallback_endpoint: None,
            next_registration_index: 0,
        }
    }

    /// Set the transport returned when no transport rule matches.
    #[must_use]
    pub fn default_transport(mut self, name: impl Into<String>) -> Self {
        self.default_transport = name.into();
        self
    }

    /// Set the endpoint returned when no endpoint rule matches.
    #[must_use]
    pub fn fallback_endpoint(mut self, name: impl Into<String>) -> Self {
        self.fallback_endpoint = Some(name.into());
        self
    }

    /// Register an unconditional transport rule.
    #[must_use]
    pub fn transport_rule(self, message_type: impl Into<String>, transport: impl Into<String>) -> Self {
        self.transport_rule_inner(message_type.into(), transport.into(), None)
    }

    /// Register a transport rule guarded by a predicate.
    #[must_use]
    pub fn transport_rule_if(
        self,
        message_type: impl Into<String>,
        transport: impl Into<String>,
        predicate: RoutePredicate,
    ) -> Self {
        self.transport_rule_inner(message_type.into(), transport.into(), Some(predicate))
    }

    fn transport_rule_inner(
        mut self,
        message_type: String,
        transport: String,
        predicate: Option<RoutePredicate>,
    ) -> Self {
        let matcher = compile(&message_type);
        let index = self.next_registration_index;
        self.next_registration_index += 1;
        self.transport_rules.push(TransportRule {
            message_type,
            matcher,
            predicate,
            transport,
            registration_index: index,
        });
        self
    }

    /// Register an unconditional endpoint rule.
    #[must_use]
    pub fn endpoint_rule(self, message_type: impl Into<String>, endpoints: Vec<String>) -> Self {
        self.endpoint_rule_inner(message_type.into(), endpoints, None)
    }

    /// Register an endpoint rule guarded by a predicate.
    #[must_use]
    pub fn endpoint_rule_if(
        self,
        message_type: impl Into<String>,
        endpoints: Vec<String>,
        predicate: RoutePredicate,
    ) -> Self {
        self.endpoint_rule_inner(message_type.into(), endpoints, Some(predicate))
    }

    fn endpoint_rule_inner(
        mut self,
        message_type: String,
        endpoints: Vec<String>,
        predicate: Option<RoutePredicate>,
    ) -> Self {
        let matcher = compile(&message_type);
        let index = self.next_registration_index;
        self.next_registration_index += 1;
        self.endpoint_rules.push(EndpointRule {
            message_type,
            matcher,
            predicate,
            endpoints,
            registration_index: index,
        });
        self
    }

    /// Finalize the router.
    #[must_use]
    pub fn build(self) -> Router {
        Router {
            transport_rules: self.transport_rules,
            endpoint_rules: self.endpoint_rules,
            default_transport: self.default_transport,
            fallback_endpoint: self.fallback_endpoint,
            transport_cache: Mutex::new(HashMap::new()),
            endpoint_cache: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a transport name and a set of endpoints for a dispatched
/// message, caching context-independent (unconditional) resolutions.
pub struct Router {
    transport_rules: Vec<TransportRule>,
    endpoint_rules: Vec<EndpointRule>,
    default_transport: String,
    fallback_endpoint: Option<String>,
    transport_cache: Mutex<HashMap<String, String>>,
    endpoint_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl Router {
    /// Select the transport for `message`, honoring registration order and
    /// the first-unconditional-match cache.
    pub async fn select_transport(&self, message: &Message, context: &MessageContext) -> String {
        if let Some(cached) = self.transport_cache.lock().await.get(&message.message_type) {
            return cached.clone();
        }

        let mut saw_conditional = false;
        let mut matched: Option<&str> = None;
        for rule in &self.transport_rules {
            if !rule.matcher.is_match(&message.message_type) {
                continue;
            }
            match &rule.predicate {
                None => {
                    matched = Some(&rule.transport);
                    break;
                }
                Some(pred) => {
                    saw_conditional = true;
                    if pred(message, context) {
                        matched = Some(&rule.transport);
                        break;
                    }
                }
            }
        }

        let resolved = matched.map_or_else(|| self.default_transport.clone(), str::to_string);
        if !saw_conditional {
            self.transport_cache
                .lock()
                .await
                .insert(message.message_type.clone(), resolved.clone());
        }
        debug!(target: "conduit.routing", message_type = %message.message_type, transport = %resolved, cached = !saw_conditional, "transport selected");
        resolved
    }

    /// Resolve the endpoint set for `message`, deduplicated case-insensitively
    /// in first-seen order.
    pub async fn route_to_endpoints(&self, message: &Message, context: &MessageContext) -> Vec<String> {
        if let Some(cached) = self.endpoint_cache.lock().await.get(&message.message_type) {
            return cached.clone();
        }

        let mut saw_conditional = false;
        let mut seen_lower: Vec<String> = Vec::new();
        let mut result: Vec<String> = Vec::new();
        for rule in &self.endpoint_rules {
            if !rule.matcher.is_match(&message.message_type) {
                continue;
            }
            let applies = match &rule.predicate {
                None => true,
                Some(pred) => {
                    saw_conditional = true;
                    pred(message, context)
                }
            };
            if !applies {
                continue;
            }
            for endpoint in &rule.endpoints {
                let lower = endpoint.to_ascii_lowercase();
                if !seen_lower.contains(&lower) {
                    seen_lower.push(lower);
                    result.push(endpoint.clone());
                }
            }
        }

        if result.is_empty() {
            if let Some(fallback) = &self.fallback_endpoint {
                result.push(fallback.clone());
            }
        }

        if !saw_conditional {
            self.endpoint_cache
                .lock()
                .await
                .insert(message.message_type.clone(), result.clone());
        }
        result
    }

    /// Resolve both transport and endpoints, producing a [`RoutingDecision`].
    pub async fn dispatch_route(&self, message: &Message, context: &MessageContext) -> RoutingDecision {
        let transport = self.select_transport(message, context).await;
        if transport.is_empty() {
            return RoutingDecision::Failure {
                reason: "No transport".to_string(),
            };
        }
        let endpoints = self.route_to_endpoints(message, context).await;
        let mut matched_rule_labels = vec![format!("transport:{transport}")];
        matched_rule_labels.extend(endpoints.iter().map(|e| format!("endpoint:{e}")));
        RoutingDecision::Success {
            transport,
            endpoints,
            matched_rule_labels,
        }
    }

    /// Whether `destination` is reachable as either the resolved transport
    /// or one of the resolved endpoints.
    pub async fn can_route_to(&self, message: &Message, context: &MessageContext, destination: &str) -> bool {
        let transport = self.select_transport(message, context).await;
        if transport.eq_ignore_ascii_case(destination) {
            return true;
        }
        self.route_to_endpoints(message, context)
            .await
            .iter()
            .any(|e| e.eq_ignore_ascii_case(destination))
    }

    /// All routes available to `message` given `context`: transport rules
    /// whose predicate currently holds, unioned with matching endpoint
    /// rules, each carrying its registration-order priority. The fallback
    /// endpoint (if used) is reported with `priority = i32::MAX`.
    pub async fn get_available_routes(&self, message: &Message, context: &MessageContext) -> Vec<RouteDescriptor> {
        let mut routes = Vec::new();
        for rule in &self.transport_rules {
            if !rule.matcher.is_match(&message.message_type) {
                continue;
            }
            if rule.predicate.as_ref().is_some_and(|p| !p(message, context)) {
                continue;
            }
            routes.push(RouteDescriptor {
                name: rule.transport.clone(),
                route_type: RouteType::Transport,
                priority: rule.registration_index as i32,
                registration_index: rule.registration_index,
            });
        }

        let mut any_endpoint_matched = false;
        for rule in &self.endpoint_rules {
            if !rule.matcher.is_match(&message.message_type) {
                continue;
            }
            if rule.predicate.as_ref().is_some_and(|p| !p(message, context)) {
                continue;
            }
            any_endpoint_matched = true;
            for endpoint in &rule.endpoints {
                routes.push(RouteDescriptor {
                    name: endpoint.clone(),
                    route_type: RouteType::Endpoint,
                    priority: rule.registration_index as i32,
                    registration_index: rule.registration_index,
                });
            }
        }

        if !any_endpoint_matched {
            if let Some(fallback) = &self.fallback_endpoint {
                routes.push(RouteDescriptor {
                    name: fallback.clone(),
                    route_type: RouteType::Endpoint,
                    priority: i32::MAX,
                    registration_index: usize::MAX,
                });
            }
        }

        routes
    }
}
