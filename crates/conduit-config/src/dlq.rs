// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML-shaped options for the retry policy, poison detector chain, and
//! [`conduit_dlq::PoisonHandlerConfig`].

use std::time::Duration;

use conduit_dlq::{
    CompositePoisonDetector, MaxRetriesExceeded, MessageAgeExceeded, PoisonHandlerConfig,
    RepeatedDeserializationFailure, RetryConfig,
};
use serde::{Deserialize, Serialize};

/// Thresholds for the built-in poison detectors, composed in the fixed
/// order `MaxRetriesExceeded` → `MessageAgeExceeded` →
/// `RepeatedDeserializationFailure` (first positive verdict wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoisonDetectorOptions {
    /// `processing_attempts` at or above which a message is poison,
    /// independent of the retry policy's own `max_retries`.
    pub max_retries: u32,
    /// Age since first attempt, in seconds, beyond which a message is
    /// poison.
    pub max_age_secs: u64,
    /// Consecutive deserialization-flavored failures at or above which a
    /// message is poison.
    pub repeated_deserialization_failure_threshold: u32,
}

impl Default for PoisonDetectorOptions {
    fn default() -> Self {
        Self { max_retries: 4, max_age_secs: 86_400, repeated_deserialization_failure_threshold: 3 }
    }
}

impl PoisonDetectorOptions {
    /// Build the fixed-order detector chain this section describes.
    #[must_use]
    pub fn to_composite_detector(&self) -> CompositePoisonDetector {
        CompositePoisonDetector::new()
            .with_detector(MaxRetriesExceeded::new(self.max_retries))
            .with_detector(MessageAgeExceeded::new(Duration::from_secs(self.max_age_secs)))
            .with_detector(RepeatedDeserializationFailure::new(self.repeated_deserialization_failure_threshold))
    }
}

/// Options for the retry/backoff policy, the poison detector chain, and
/// the poison handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqOptions {
    /// Backoff policy applied before a handler invocation is retried.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Poison detector thresholds.
    #[serde(default)]
    pub detectors: PoisonDetectorOptions,
    /// Exception-capture policy for quarantined entries.
    #[serde(default)]
    pub handler: PoisonHandlerConfig,
}

impl Default for DlqOptions {
    fn default() -> Self {
        Self { retry: RetryConfig::default(), detectors: PoisonDetectorOptions::default(), handler: PoisonHandlerConfig::default() }
    }
}
