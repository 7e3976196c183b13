// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for [`conduit_ratelimit::RateLimitConfig`].

use std::collections::BTreeMap;
use std::time::Duration;

use conduit_ratelimit::{LimiterSpec, RateLimitConfig};
use serde::{Deserialize, Serialize};

/// A single limiter algorithm, tagged by `kind` in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimiterSpecOptions {
    /// See [`LimiterSpec::TokenBucket`].
    TokenBucket {
        /// Bucket capacity.
        token_limit: u32,
        /// Tokens added per replenishment tick.
        tokens_per_period: u32,
        /// Replenishment period, in seconds.
        replenishment_period_secs: u64,
        /// Permits queued instead of rejected outright; `0` disables queueing.
        #[serde(default)]
        queue_limit: u32,
    },
    /// See [`LimiterSpec::SlidingWindow`].
    SlidingWindow {
        /// Maximum permits within the window.
        permit_limit: u32,
        /// Window length, in seconds.
        window_secs: u64,
    },
    /// See [`LimiterSpec::FixedWindow`].
    FixedWindow {
        /// Maximum permits within the window.
        permit_limit: u32,
        /// Window length, in seconds.
        window_secs: u64,
    },
    /// See [`LimiterSpec::Concurrency`].
    Concurrency {
        /// Maximum concurrently held permits.
        concurrency_limit: u32,
        /// Callers queued waiting for a permit before rejection.
        #[serde(default)]
        queue_limit: u32,
    },
}

impl LimiterSpecOptions {
    /// Build the typed [`LimiterSpec`] this entry describes.
    #[must_use]
    pub fn to_limiter_spec(&self) -> LimiterSpec {
        match self {
            LimiterSpecOptions::TokenBucket { token_limit, tokens_per_period, replenishment_period_secs, queue_limit } => {
                LimiterSpec::TokenBucket {
                    token_limit: *token_limit,
                    tokens_per_period: *tokens_per_period,
                    replenishment_period: Duration::from_secs(*replenishment_period_secs),
                    queue_limit: *queue_limit,
                }
            }
            LimiterSpecOptions::SlidingWindow { permit_limit, window_secs } => {
                LimiterSpec::SlidingWindow { permit_limit: *permit_limit, window: Duration::from_secs(*window_secs) }
            }
            LimiterSpecOptions::FixedWindow { permit_limit, window_secs } => {
                LimiterSpec::FixedWindow { permit_limit: *permit_limit, window: Duration::from_secs(*window_secs) }
            }
            LimiterSpecOptions::Concurrency { concurrency_limit, queue_limit } => {
                LimiterSpec::Concurrency { concurrency_limit: *concurrency_limit, queue_limit: *queue_limit }
            }
        }
    }
}

impl Default for LimiterSpecOptions {
    fn default() -> Self {
        LimiterSpecOptions::TokenBucket {
            token_limit: 100,
            tokens_per_period: 100,
            replenishment_period_secs: 60,
            queue_limit: 0,
        }
    }
}

/// Options for [`conduit_ratelimit::RateLimitMiddleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitOptions {
    /// Master on/off switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Algorithm applied when no per-tenant override matches the dispatch
    /// key.
    #[serde(default)]
    pub default: LimiterSpecOptions,
    /// Per-key overrides, keyed by the same string
    /// `context.rate_limit_key()` produces.
    #[serde(default)]
    pub overrides: BTreeMap<String, LimiterSpecOptions>,
    /// `retryAfterMilliseconds` reported when a limiter cannot produce a
    /// better estimate of its own.
    #[serde(default = "default_retry_after_ms")]
    pub default_retry_after_ms: u64,
    /// Idle limiters older than this are evicted on the next cleanup
    /// pass, in seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_retry_after_ms() -> u64 {
    1_000
}
fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            default: LimiterSpecOptions::default(),
            overrides: BTreeMap::new(),
            default_retry_after_ms: default_retry_after_ms(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitOptions {
    /// Build the typed [`RateLimitConfig`] this section describes.
    #[must_use]
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::new()
            .with_default(self.default.to_limiter_spec());
        for (key, spec) in &self.overrides {
            config = config.with_override(key.clone(), spec.to_limiter_spec());
        }
        if !self.enabled {
            config = config.disabled();
        }
        config.default_retry_after_ms = self.default_retry_after_ms;
        config.cleanup_interval = Duration::from_secs(self.cleanup_interval_secs);
        config
    }
}
