// SPDX-License-Identifier: MIT OR Apache-2.0
//! JWT claims shape and role/tenant claim mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A role claim value: either a single role string or a list of roles, as
/// JWT issuers encode it either way depending on role count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    /// A single role.
    Single(String),
    /// Multiple roles.
    Multiple(Vec<String>),
}

impl RoleClaim {
    /// Flatten into an owned list of role strings.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(r) => vec![r],
            Self::Multiple(rs) => rs,
        }
    }
}

/// The standard role claim URI some JWT issuers use instead of the short
/// `role` claim name.
pub const ROLE_CLAIM_URI: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/role";

/// Decoded JWT claims.
///
/// `tenant_id` is deliberately the only claim mapped to the context's
/// tenant id — the short-name `tid` claim that some JWT libraries remap
/// automatically is intentionally left unmapped (see DESIGN.md).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — maps to `UserId`.
    #[serde(default)]
    pub sub: Option<String>,
    /// Display name — maps to `UserName`.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address — maps to `Email`.
    #[serde(default)]
    pub email: Option<String>,
    /// Tenant id, under its unmapped claim name — maps to `TenantId`.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Role claim under the short name `role`.
    #[serde(default)]
    pub role: Option<RoleClaim>,
    /// Role claim under the standard role URI.
    #[serde(default, rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/role")]
    pub role_uri: Option<RoleClaim>,
    /// Authentication methods reference; overrides `AuthenticationMethod`
    /// when present.
    #[serde(default)]
    pub amr: Option<Vec<String>>,
    /// Expiration (seconds since epoch); validated by `jsonwebtoken`.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<String>,
    /// Any other claims, preserved for the `Principal` snapshot.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Claims {
    /// The union of `role` and the role-URI claim, deduplicated in
    /// first-seen order.
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for claim in [self.role.clone(), self.role_uri.clone()].into_iter().flatten() {
            for role in claim.into_vec() {
                if !seen.contains(&role) {
                    seen.push(role);
                }
            }
        }
        seen
    }
}
