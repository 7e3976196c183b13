// SPDX-License-Identifier: MIT OR Apache-2.0
//! The four limiting algorithms and the keyed, lazily-created limiter cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::LimiterSpec;

/// The result of a single `try_acquire` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether a permit was granted.
    pub granted: bool,
    /// The limiter's best estimate of when a permit may next be available,
    /// in milliseconds. Only meaningful when `granted` is `false`.
    pub retry_after_ms: u64,
}

/// Mutable state for one of the four limiting algorithms, keyed by a single
/// rate-limit key and held behind one lock.
enum Algorithm {
    TokenBucket {
        capacity: f64,
        tokens: f64,
        refill_per_sec: f64,
        last_refill: Instant,
    },
    SlidingWindow {
        permit_limit: u32,
        window: Duration,
        timestamps: Vec<Instant>,
    },
    FixedWindow {
        permit_limit: u32,
        window: Duration,
        window_start: Instant,
        count: u32,
    },
    Concurrency {
        limit: u32,
        in_use: u32,
    },
}

impl Algorithm {
    fn new(spec: &LimiterSpec, now: Instant) -> Self {
        match *spec {
            LimiterSpec::TokenBucket {
                token_limit,
                tokens_per_period,
                replenishment_period,
                ..
            } => {
                let period_secs = replenishment_period.as_secs_f64().max(f64::EPSILON);
                Self::TokenBucket {
                    capacity: f64::from(token_limit),
                    tokens: f64::from(token_limit),
                    refill_per_sec: f64::from(tokens_per_period) / period_secs,
                    last_refill: now,
                }
            }
            LimiterSpec::SlidingWindow { permit_limit, window } => Self::SlidingWindow {
                permit_limit,
                window,
                timestamps: Vec::new(),
            },
            LimiterSpec::FixedWindow { permit_limit, window } => Self::FixedWindow {
                permit_limit,
                window,
                window_start: now,
                count: 0,
            },
            LimiterSpec::Concurrency { concurrency_limit, .. } => Self::Concurrency {
                limit: concurrency_limit,
                in_use: 0,
            },
        }
    }

    fn try_acquire(&mut self, now: Instant, default_retry_after_ms: u64) -> Decision {
        match self {
            Self::TokenBucket {
                capacity,
                tokens,
                refill_per_sec,
                last_refill,
            } => {
                let elapsed = now.duration_since(*last_refill).as_secs_f64();
                *tokens = (*tokens + elapsed * *refill_per_sec).min(*capacity);
                *last_refill = now;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    Decision {
                        granted: true,
                        retry_after_ms: 0,
                    }
                } else {
                    let deficit = 1.0 - *tokens;
                    let wait_secs = if *refill_per_sec > 0.0 {
                        deficit / *refill_per_sec
                    } else {
                        default_retry_after_ms as f64 / 1000.0
                    };
                    Decision {
                        granted: false,
                        retry_after_ms: (wait_secs * 1000.0).ceil() as u64,
                    }
                }
            }
            Self::SlidingWindow {
                permit_limit,
                window,
                timestamps,
            } => {
                timestamps.retain(|t| now.duration_since(*t) < *window);
                if (timestamps.len() as u32) < *permit_limit {
                    timestamps.push(now);
                    Decision {
                        granted: true,
                        retry_after_ms: 0,
                    }
                } else {
                    let oldest = timestamps.first().copied().unwrap_or(now);
                    let remaining = window.saturating_sub(now.duration_since(oldest));
                    Decision {
                        granted: false,
                        retry_after_ms: remaining.as_millis() as u64,
                    }
                }
            }
            Self::FixedWindow {
                permit_limit,
                window,
                window_start,
                count,
            } => {
                if now.duration_since(*window_start) >= *window {
                    *window_start = now;
                    *count = 0;
                }
                if *count < *permit_limit {
                    *count += 1;
                    Decision {
                        granted: true,
                        retry_after_ms: 0,
                    }
                } else {
                    let remaining = window.saturating_sub(now.duration_since(*window_start));
                    Decision {
                        granted: false,
                        retry_after_ms: remaining.as_millis() as u64,
                    }
                }
            }
            Self::Concurrency { limit, in_use } => {
                if *in_use < *limit {
                    *in_use += 1;
                    Decision {
                        granted: true,
                        retry_after_ms: 0,
                    }
                } else {
                    Decision {
                        granted: false,
                        retry_after_ms: default_retry_after_ms,
                    }
                }
            }
        }
    }

    /// Releases a previously granted concurrency permit. A no-op for every
    /// other algorithm, since only the concurrency limiter holds permits
    /// across the wrapped call.
    fn release(&mut self) {
        if let Self::Concurrency { in_use, .. } = self {
            *in_use = in_use.saturating_sub(1);
        }
    }
}

struct Entry {
    algorithm: Mutex<Algorithm>,
    last_touched: Mutex<Instant>,
}

/// A lazily-created, per-key cache of limiter state.
///
/// Limiters are created on first use from the [`LimiterSpec`] resolved for
/// that key and kept until [`LimiterRegistry::cleanup_idle`] evicts them.
pub struct LimiterRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl LimiterRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to acquire a permit for `key`, creating its limiter from
    /// `spec` if this is the first use.
    pub async fn try_acquire(&self, key: &str, spec: &LimiterSpec, default_retry_after_ms: u64) -> Decision {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                algorithm: Mutex::new(Algorithm::new(spec, now)),
                last_touched: Mutex::new(now),
            });
        *entry.last_touched.lock().await = now;
        entry.algorithm.lock().await.try_acquire(now, default_retry_after_ms)
    }

    /// Release a concurrency permit previously granted for `key`. A no-op
    /// if `key` is not backed by a concurrency limiter or was evicted.
    pub async fn release(&self, key: &str) {
        let entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            entry.algorithm.lock().await.release();
        }
    }

    /// Evict limiters untouched for longer than `idle_after`.
    ///
    /// Intended to be driven by an externally-scheduled periodic task
    /// (matching the `CleanupIntervalMinutes` knob); this crate does not
    /// spawn one itself.
    pub async fn cleanup_idle(&self, idle_after: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let mut stale = Vec::new();
        for (key, entry) in entries.iter() {
            if now.duration_since(*entry.last_touched.lock().await) > idle_after {
                stale.push(key.clone());
            }
        }
        for key in stale {
            entries.remove(&key);
        }
    }

    /// Number of distinct keys currently cached.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_grants_up_to_capacity_then_denies() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::token_bucket(2, 2, Duration::from_secs(60));
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
        let third = registry.try_acquire("k", &spec, 1000).await;
        assert!(!third.granted);
        assert!(third.retry_after_ms > 0);
    }

    #[tokio::test]
    async fn sliding_window_denies_once_limit_reached() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::sliding_window(1, Duration::from_secs(60));
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
        assert!(!registry.try_acquire("k", &spec, 1000).await.granted);
    }

    #[tokio::test]
    async fn fixed_window_resets_after_window_elapses() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::fixed_window(1, Duration::from_millis(20));
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
        assert!(!registry.try_acquire("k", &spec, 1000).await.granted);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
    }

    #[tokio::test]
    async fn concurrency_limiter_requires_explicit_release() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::concurrency(1);
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
        assert!(!registry.try_acquire("k", &spec, 1000).await.granted);
        registry.release("k").await;
        assert!(registry.try_acquire("k", &spec, 1000).await.granted);
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_limiters() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::concurrency(1);
        assert!(registry.try_acquire("a", &spec, 1000).await.granted);
        assert!(registry.try_acquire("b", &spec, 1000).await.granted);
    }

    #[tokio::test]
    async fn cleanup_idle_evicts_untouched_keys() {
        let registry = LimiterRegistry::new();
        let spec = LimiterSpec::concurrency(1);
        registry.try_acquire("a", &spec, 1000).await;
        assert_eq!(registry.len().await, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.cleanup_idle(Duration::from_millis(1)).await;
        assert_eq!(registry.len().await, 0);
    }
}
