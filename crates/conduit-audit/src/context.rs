// SPDX-License-Identifier: MIT OR Apache-2.0
//! Extraction rules turning a dispatch [`MessageContext`] into the fields
//! of an [`AuditEvent`].

use conduit_core::{AuditEvent, MessageContext};

const USER_ID_KEY: &str = "User:MessageId";
const SOURCE_IP_KEY: &str = "Client:IP";
const USER_AGENT_KEY: &str = "Client:UserAgent";
const MESSAGE_TYPE_KEY: &str = "Message:Type";
const ADDITIONAL_DATA_PREFIXES: [&str; 3] = ["Security:", "Auth:", "Validation:"];

/// Populate `event`'s context-derived fields from `context`.
///
/// `correlation_id` is copied only if it parses as a UUID; item keys
/// `"User:MessageId"`, `"Client:IP"`, `"Client:UserAgent"`, and
/// `"Message:Type"` map to their named fields; any item key beginning with
/// `"Security:"`, `"Auth:"`, or `"Validation:"` is copied verbatim into
/// `additional_data`. No other keys are copied.
pub fn enrich_from_context(event: &mut AuditEvent, context: &MessageContext) {
    event.correlation_id = context
        .correlation_id
        .as_deref()
        .filter(|id| uuid::Uuid::parse_str(id).is_ok())
        .map(str::to_owned);

    if let Some(user_id) = context.item_str(USER_ID_KEY) {
        event.user_id = Some(user_id.to_string());
    }
    if let Some(ip) = context.item_str(SOURCE_IP_KEY) {
        event.source_ip = Some(ip.to_string());
    }
    if let Some(agent) = context.item_str(USER_AGENT_KEY) {
        event.user_agent = Some(agent.to_string());
    }
    if let Some(message_type) = context.item_str(MESSAGE_TYPE_KEY) {
        event.message_type = Some(message_type.to_string());
    }

    for (key, value) in &context.items {
        if ADDITIONAL_DATA_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
            event.additional_data.insert(key.clone(), value.clone());
        }
    }
}
