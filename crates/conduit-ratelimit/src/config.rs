// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rate limiter configuration: algorithm choice, per-tenant overrides, and
//! cache lifecycle knobs.

use std::collections::BTreeMap;
use std::time::Duration;

/// Which limiting algorithm a [`LimiterSpec`] configures.
#[derive(Debug, Clone)]
pub enum LimiterSpec {
    /// Capacity `token_limit`, refilled by `tokens_per_period` every
    /// `replenishment_period`. `queue_limit = 0` rejects immediately once
    /// the bucket is empty.
    TokenBucket {
        /// Bucket capacity.
        token_limit: u32,
        /// Tokens added per replenishment tick.
        tokens_per_period: u32,
        /// How often the bucket replenishes.
        replenishment_period: Duration,
        /// Permits queued instead of rejected outright; `0` disables queueing.
        queue_limit: u32,
    },
    /// `permit_limit` requests within a rolling `window`.
    SlidingWindow {
        /// Maximum permits within the window.
        permit_limit: u32,
        /// Window length.
        window: Duration,
    },
    /// `permit_limit` requests within a fixed-size window that resets on
    /// boundary crossing.
    FixedWindow {
        /// Maximum permits within the window.
        permit_limit: u32,
        /// Window length.
        window: Duration,
    },
    /// At most `concurrency_limit` in-flight permits at once; `queue_limit`
    /// additional callers wait before being rejected.
    Concurrency {
        /// Maximum concurrently held permits.
        concurrency_limit: u32,
        /// Callers queued waiting for a permit before rejection.
        queue_limit: u32,
    },
}

impl LimiterSpec {
    /// A token bucket refilling `tokens_per_period` tokens every
    /// `replenishment_period`, with no queueing.
    #[must_use]
    pub fn token_bucket(token_limit: u32, tokens_per_period: u32, replenishment_period: Duration) -> Self {
        Self::TokenBucket {
            token_limit,
            tokens_per_period,
            replenishment_period,
            queue_limit: 0,
        }
    }

    /// A sliding window of `permit_limit` requests per `window`.
    #[must_use]
    pub fn sliding_window(permit_limit: u32, window: Duration) -> Self {
        Self::SlidingWindow { permit_limit, window }
    }

    /// A fixed window of `permit_limit` requests per `window`.
    #[must_use]
    pub fn fixed_window(permit_limit: u32, window: Duration) -> Self {
        Self::FixedWindow { permit_limit, window }
    }

    /// A concurrency limiter admitting at most `concurrency_limit` in-flight
    /// permits, with no queueing.
    #[must_use]
    pub fn concurrency(concurrency_limit: u32) -> Self {
        Self::Concurrency {
            concurrency_limit,
            queue_limit: 0,
        }
    }
}

/// Configuration for [`crate::middleware::RateLimitMiddleware`].
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Master on/off switch.
    pub enabled: bool,
    /// Algorithm applied when no per-tenant override matches the dispatch
    /// key.
    pub default: LimiterSpec,
    /// Per-key overrides, keyed by the same string `context.rate_limit_key()`
    /// produces.
    pub overrides: BTreeMap<String, LimiterSpec>,
    /// `retryAfterMilliseconds` reported when a limiter cannot produce a
    /// better estimate of its own.
    pub default_retry_after_ms: u64,
    /// Idle limiters older than this are evicted on the next cleanup pass.
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: LimiterSpec::token_bucket(100, 100, Duration::from_secs(60)),
            overrides: BTreeMap::new(),
            default_retry_after_ms: 1_000,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// The default configuration: a global 100-per-minute token bucket,
    /// keyed by `context.rate_limit_key()` (falling back to `"__default__"`
    /// when no tenant is present).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the middleware entirely.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Replace the default (unkeyed-fallback) limiter algorithm.
    #[must_use]
    pub fn with_default(mut self, spec: LimiterSpec) -> Self {
        self.default = spec;
        self
    }

    /// Register a per-key override.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, spec: LimiterSpec) -> Self {
        self.overrides.insert(key.into(), spec);
        self
    }

    fn spec_for(&self, key: &str) -> &LimiterSpec {
        self.overrides.get(key).unwrap_or(&self.default)
    }

    pub(crate) fn spec_for_key(&self, key: &str) -> LimiterSpec {
        self.spec_for(key).clone()
    }
}
