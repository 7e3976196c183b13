// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration errors and advisory warnings.

/// Errors that can occur while loading or validating a [`crate::ConduitConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A recommended optional section is missing, so its component runs
    /// with built-in defaults.
    MissingOptionalField {
        /// Name of the missing section.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A timeout or interval is unusually large.
    LargeTimeout {
        /// Name of the option carrying the value.
        field: String,
        /// The value itself, in milliseconds.
        millis: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { field, millis } => {
                write!(f, "'{field}' has an unusually large timeout ({millis}ms)")
            }
        }
    }
}
