// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-config
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! TOML configuration loading, validation, and merging for every
//! middleware crate in the workspace. [`ConduitConfig`] is the top-level
//! options bag; each section mirrors the component it configures
//! (`conduit-auth`, `conduit-validate`, `conduit-ratelimit`,
//! `conduit-signing`, `conduit-dlq`, `conduit-audit`) and knows how to
//! build that component's own runtime config type.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors and advisory warnings surfaced while loading or validating a
/// configuration.
pub mod error;
/// `[jwt]` section.
pub mod jwt;
/// `[rate_limit]` section.
pub mod rate_limit;
/// `[signing]` section.
pub mod signing;
/// `[validation]` section.
pub mod validate;
/// `[dlq]` section.
pub mod dlq;
/// `[audit]` section.
pub mod audit;

pub use audit::AuditOptions;
pub use dlq::{DlqOptions, PoisonDetectorOptions};
pub use error::{ConfigError, ConfigWarning};
pub use jwt::JwtOptions;
pub use rate_limit::{LimiterSpecOptions, RateLimitOptions};
pub use signing::SigningOptions;
pub use validate::ValidationOptions;

/// The top-level options bag for a `Dispatcher` instance.
///
/// Every section has sensible built-in defaults, so any subset of
/// `[jwt]`, `[validation]`, `[rate_limit]`, `[signing]`, `[dlq]`, and
/// `[audit]` tables may be present in a TOML document; absent tables
/// fall back to their component's `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConduitConfig {
    /// JWT authentication middleware options. `None` means authentication
    /// is not configured at all (distinct from `enabled = false`, which
    /// still builds a middleware that passes every message through).
    #[serde(default)]
    pub jwt: Option<JwtOptions>,
    /// Input validation middleware options.
    #[serde(default)]
    pub validation: ValidationOptions,
    /// Rate limiting middleware options.
    #[serde(default)]
    pub rate_limit: RateLimitOptions,
    /// Message signing middleware options.
    #[serde(default)]
    pub signing: SigningOptions,
    /// Retry policy, poison detector thresholds, and DLQ handler options.
    #[serde(default)]
    pub dlq: DlqOptions,
    /// Security event logger options.
    #[serde(default)]
    pub audit: AuditOptions,
}

/// Load a [`ConduitConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ConduitConfig::default()`].
pub fn load_config(path: Option<&Path>) -> Result<ConduitConfig, ConfigError> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|_| ConfigError::FileNotFound { path: p.display().to_string() })?;
            parse_toml(&content)
        }
        None => Ok(ConduitConfig::default()),
    }
}

/// Parse a TOML string into a [`ConduitConfig`].
pub fn parse_toml(content: &str) -> Result<ConduitConfig, ConfigError> {
    toml::from_str::<ConduitConfig>(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (conflicting signing key material, a zero-capacity rate
/// limit, an out-of-range clock skew) come back as a
/// [`ConfigError::ValidationError`]; soft issues (a missing optional
/// section, an unusually large timeout) come back as warnings.
pub fn validate_config(config: &ConduitConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    match &config.jwt {
        None => {
            warnings.push(ConfigWarning::MissingOptionalField {
                field: "jwt".into(),
                hint: "authentication middleware will not be built; every message dispatches unauthenticated".into(),
            });
        }
        Some(jwt) => {
            if jwt.enabled && jwt.hmac_secret.is_none() && jwt.rsa_public_key_pem.is_none() && !jwt.use_async_key_retrieval {
                errors.push("jwt: enabled but no signing key material configured (hmac_secret, rsa_public_key_pem, or use_async_key_retrieval)".into());
            }
            if jwt.hmac_secret.is_some() && jwt.rsa_public_key_pem.is_some() {
                warnings.push(ConfigWarning::MissingOptionalField {
                    field: "jwt.rsa_public_key_pem".into(),
                    hint: "both hmac_secret and rsa_public_key_pem are set; hmac_secret takes precedence".into(),
                });
            }
            if jwt.clock_skew_seconds > 3_600 {
                warnings.push(ConfigWarning::LargeTimeout { field: "jwt.clock_skew_seconds".into(), millis: jwt.clock_skew_seconds * 1_000 });
            }
        }
    }

    if config.rate_limit.enabled {
        if let LimiterSpecOptions::TokenBucket { token_limit, .. } = &config.rate_limit.default {
            if *token_limit == 0 {
                errors.push("rate_limit.default: token_limit must be greater than zero".into());
            }
        }
        if let LimiterSpecOptions::Concurrency { concurrency_limit, .. } = &config.rate_limit.default {
            if *concurrency_limit == 0 {
                errors.push("rate_limit.default: concurrency_limit must be greater than zero".into());
            }
        }
    }

    if config.signing.enabled && config.signing.key_id.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "signing.key_id".into(),
            hint: "the configured KeyProvider will be asked to resolve a key with no id hint".into(),
        });
    }
    if config.signing.max_signature_age_minutes <= 0 {
        errors.push("signing.max_signature_age_minutes must be positive".into());
    }

    if config.dlq.retry.max_delay < config.dlq.retry.base_delay {
        errors.push("dlq.retry: max_delay must be greater than or equal to base_delay".into());
    }
    if config.dlq.detectors.max_retries == 0 {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "dlq.detectors.max_retries".into(),
            hint: "a threshold of 0 quarantines a message on its very first attempt".into(),
        });
    }

    if config.audit.0.shutdown_timeout.as_millis() as u64 > 30_000 {
        warnings.push(ConfigWarning::LargeTimeout {
            field: "audit.shutdown_timeout".into(),
            millis: config.audit.0.shutdown_timeout.as_millis() as u64,
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Merge two configurations. Values in `overlay` take precedence over
/// `base`; `overlay`'s sections entirely replace `base`'s (sections are
/// not merged field-by-field, matching the coarse-grained override model
/// of the rest of the workspace's rule tables).
#[must_use]
pub fn merge_configs(base: ConduitConfig, overlay: ConduitConfig) -> ConduitConfig {
    ConduitConfig {
        jwt: overlay.jwt.or(base.jwt),
        validation: overlay.validation,
        rate_limit: overlay.rate_limit,
        signing: overlay.signing,
        dlq: overlay.dlq,
        audit: overlay.audit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_with_warnings() {
        let cfg = ConduitConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::MissingOptionalField { field, .. } if field == "jwt")));
    }

    #[test]
    fn enabled_jwt_without_key_material_is_an_error() {
        let mut cfg = ConduitConfig::default();
        cfg.jwt = Some(JwtOptions::default());
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn parse_full_toml_document() {
        let toml_str = r#"
            [jwt]
            hmac_secret = "s3cret"
            issuer = "conduit"

            [validation]
            enabled = true
            check_sql_injection = true
            check_nosql_injection = true
            check_command_injection = true
            check_ldap_injection = true
            check_path_traversal = true
            check_html_injection = true
            check_control_characters = true
            require_correlation_id = true

            [rate_limit]
            enabled = true
            [rate_limit.default]
            kind = "token_bucket"
            token_limit = 50
            tokens_per_period = 50
            replenishment_period_secs = 60

            [signing]
            enabled = true
            require_valid_signature = true

            [dlq.retry]
            max_retries = 3
            base_delay = 100
            max_delay = 10000
            overall_timeout = 60000
            jitter_factor = 0.5

            [audit]
            queue_capacity = 1024
            batch_size = 64
            batch_interval = 200
            shutdown_timeout = 5000
        "#;
        let cfg = parse_toml(toml_str).expect("should parse");
        let warnings = validate_config(&cfg).expect("should be valid");
        assert!(warnings.is_empty());
        assert_eq!(cfg.jwt.unwrap().issuer.as_deref(), Some("conduit"));
    }

    #[test]
    fn merge_overlay_replaces_base_sections() {
        let base = ConduitConfig::default();
        let mut overlay = ConduitConfig::default();
        overlay.jwt = Some(JwtOptions { hmac_secret: Some("overlay-secret".into()), ..Default::default() });
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.jwt.unwrap().hmac_secret.as_deref(), Some("overlay-secret"));
    }

    #[test]
    fn merge_keeps_base_jwt_when_overlay_has_none() {
        let mut base = ConduitConfig::default();
        base.jwt = Some(JwtOptions { hmac_secret: Some("base-secret".into()), ..Default::default() });
        let overlay = ConduitConfig::default();
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.jwt.unwrap().hmac_secret.as_deref(), Some("base-secret"));
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/path/conduit.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).expect("should succeed");
        assert!(cfg.jwt.is_none());
    }
}
