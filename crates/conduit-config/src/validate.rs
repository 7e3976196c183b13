// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for [`conduit_validate::ValidationConfig`].
//!
//! `ValidationConfig` is already a plain serde struct, so this module is a
//! thin pass-through kept for the same reason the other sections exist:
//! one well-known TOML table (`[validation]`) per component, with the
//! component's own type as the single source of truth for defaults.

use conduit_validate::ValidationConfig;
use serde::{Deserialize, Serialize};

/// Options for [`conduit_validate::ValidationMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationOptions(pub ValidationConfig);

impl Default for ValidationOptions {
    fn default() -> Self {
        Self(ValidationConfig::default())
    }
}

impl ValidationOptions {
    /// Build the typed [`ValidationConfig`] this section describes.
    #[must_use]
    pub fn to_validation_config(&self) -> ValidationConfig {
        self.0.clone()
    }
}
