// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for the routing engine: transport selection
//! always honors first-registered-wins among unconditional matches, and
//! endpoint fan-out always deduplicates case-insensitively in
//! first-seen order.

use conduit_core::{MessageBuilder, MessageContext, MessageKind};
use conduit_routing::RouterBuilder;
use proptest::prelude::*;

/// Message type names safe to use as glob patterns (no `*`, `?`, `[`, `]`).
fn arb_type_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,11}"
}

/// A handful of distinct transport names.
fn arb_transport_names(n: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z][a-z0-9]{1,8}", n).prop_map(|mut v| {
        v.sort();
        v.dedup();
        v
    })
}

proptest! {
    /// Among any number of unconditional transport rules registered for
    /// the same message type, the first one registered always wins —
    /// regardless of how many more are registered after it.
    #[test]
    fn first_registered_unconditional_transport_rule_always_wins(
        type_name in arb_type_name(),
        transports in arb_transport_names(5),
    ) {
        prop_assume!(transports.len() >= 2);
        let mut builder = RouterBuilder::new().default_transport("fallback-bus");
        for transport in &transports {
            builder = builder.transport_rule(type_name.clone(), transport.clone());
        }
        let router = builder.build();

        let message = MessageBuilder::new(type_name.clone(), MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let selected = rt.block_on(router.select_transport(&message, &context));
        prop_assert_eq!(&selected, &transports[0]);

        // A second resolution must not re-evaluate rules: it returns the
        // same (memoized) answer.
        let selected_again = rt.block_on(router.select_transport(&message, &context));
        prop_assert_eq!(selected_again, transports[0].clone());
    }

    /// A message type with no matching transport rule always falls back
    /// to the configured default.
    #[test]
    fn unmatched_type_falls_back_to_default(type_name in arb_type_name(), other_type in arb_type_name()) {
        prop_assume!(type_name != other_type);
        let router = RouterBuilder::new()
            .default_transport("fallback-bus")
            .transport_rule(other_type, "rabbitmq")
            .build();

        let message = MessageBuilder::new(type_name, MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let selected = rt.block_on(router.select_transport(&message, &context));
        prop_assert_eq!(selected, "fallback-bus");
    }

    /// Two endpoint rules for the same message type that both produce an
    /// endpoint differing only by ASCII case collapse into a single
    /// entry, keeping the first-seen spelling.
    #[test]
    fn endpoint_dedup_is_case_insensitive_and_keeps_first_seen(
        type_name in arb_type_name(),
        endpoint in "[A-Za-z][A-Za-z0-9-]{1,10}",
    ) {
        let upper = endpoint.to_ascii_uppercase();
        let router = RouterBuilder::new()
            .endpoint_rule(type_name.clone(), vec![endpoint.clone()])
            .endpoint_rule(type_name.clone(), vec![upper, "unique-tail".to_string()])
            .build();

        let message = MessageBuilder::new(type_name, MessageKind::Action).build();
        let context = MessageContext::new(message.id.clone());
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let endpoints = rt.block_on(router.route_to_endpoints(&message, &context));

        prop_assert_eq!(endpoints.len(), 2);
        prop_assert_eq!(&endpoints[0], &endpoint);
        prop_assert_eq!(&endpoints[1], "unique-tail");
    }
}
