// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for [`conduit_audit::SecurityEventLoggerConfig`].

use conduit_audit::SecurityEventLoggerConfig;
use serde::{Deserialize, Serialize};

/// Options for [`conduit_audit::SecurityEventLogger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditOptions(pub SecurityEventLoggerConfig);

impl Default for AuditOptions {
    fn default() -> Self {
        Self(SecurityEventLoggerConfig::default())
    }
}

impl AuditOptions {
    /// Build the typed [`SecurityEventLoggerConfig`] this section
    /// describes.
    #[must_use]
    pub fn to_logger_config(&self) -> SecurityEventLoggerConfig {
        self.0.clone()
    }
}
