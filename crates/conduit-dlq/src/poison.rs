// SPDX-License-Identifier: MIT OR Apache-2.0
//! Poison-message detection: a chain of detectors, the first positive
//! verdict wins.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::DeadLetterReason;
use serde_json::Value;

use crate::retry::RetryMetadata;

/// Attempt bookkeeping handed to a poison detector.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// How many times processing has been attempted so far.
    pub processing_attempts: u32,
    /// When the first attempt occurred.
    pub first_attempt_at: Option<DateTime<Utc>>,
    /// When the most recent attempt occurred.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Retry metadata accumulated by [`crate::retry::retry_async`], if any.
    pub retry_metadata: Option<RetryMetadata>,
}

impl AttemptInfo {
    /// A freshly-started message with no prior attempts.
    #[must_use]
    pub fn first_attempt() -> Self {
        Self {
            processing_attempts: 1,
            first_attempt_at: Some(Utc::now()),
            last_attempt_at: Some(Utc::now()),
            retry_metadata: None,
        }
    }

    /// Age of the message since its first attempt.
    #[must_use]
    pub fn age(&self) -> Option<chrono::Duration> {
        self.first_attempt_at.map(|t| Utc::now() - t)
    }
}

/// Verdict returned by a single poison detector.
#[derive(Debug, Clone)]
pub struct PoisonDetectionResult {
    /// Whether this detector considers the message poison.
    pub is_poison: bool,
    /// Classification, present iff `is_poison`.
    pub reason: Option<DeadLetterReason>,
    /// Name of the detector that produced this verdict.
    pub detector_name: String,
    /// Free-form supporting details.
    pub details: BTreeMap<String, Value>,
}

impl PoisonDetectionResult {
    /// A negative verdict from `detector_name`.
    #[must_use]
    pub fn clean(detector_name: impl Into<String>) -> Self {
        Self {
            is_poison: false,
            reason: None,
            detector_name: detector_name.into(),
            details: BTreeMap::new(),
        }
    }

    /// A positive verdict from `detector_name`.
    #[must_use]
    pub fn poison(detector_name: impl Into<String>, reason: DeadLetterReason) -> Self {
        Self {
            is_poison: true,
            reason: Some(reason),
            detector_name: detector_name.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail entry, builder-style.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A pluggable poison-message verdict source.
#[async_trait]
pub trait PoisonDetector: Send + Sync {
    /// Inspect `attempts` and decide whether the message is poison.
    async fn is_poison(&self, attempts: &AttemptInfo) -> PoisonDetectionResult;

    /// Human-readable detector name, used in the returned verdict and in
    /// logs.
    fn name(&self) -> &str;
}

/// Positive once `processing_attempts` reaches `max_retries`.
pub struct MaxRetriesExceeded {
    max_retries: u32,
}

impl MaxRetriesExceeded {
    /// Build a detector that fires once `processing_attempts >= max_retries`.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

#[async_trait]
impl PoisonDetector for MaxRetriesExceeded {
    async fn is_poison(&self, attempts: &AttemptInfo) -> PoisonDetectionResult {
        if attempts.processing_attempts >= self.max_retries {
            PoisonDetectionResult::poison(self.name(), DeadLetterReason::MaxRetriesExceeded)
                .with_detail("processingAttempts", attempts.processing_attempts)
                .with_detail("maxRetries", self.max_retries)
        } else {
            PoisonDetectionResult::clean(self.name())
        }
    }

    fn name(&self) -> &str {
        "MaxRetriesExceeded"
    }
}

/// Positive once the message's age since first attempt exceeds `max_age`.
pub struct MessageAgeExceeded {
    max_age: Duration,
}

impl MessageAgeExceeded {
    /// Build a detector that fires once the message is older than `max_age`.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

#[async_trait]
impl PoisonDetector for MessageAgeExceeded {
    async fn is_poison(&self, attempts: &AttemptInfo) -> PoisonDetectionResult {
        let Some(age) = attempts.age() else {
            return PoisonDetectionResult::clean(self.name());
        };
        let age_ms = age.num_milliseconds().max(0) as u64;
        if age_ms > self.max_age.as_millis() as u64 {
            PoisonDetectionResult::poison(self.name(), DeadLetterReason::MessageExpired)
                .with_detail("ageMs", age_ms)
        } else {
            PoisonDetectionResult::clean(self.name())
        }
    }

    fn name(&self) -> &str {
        "MessageAgeExceeded"
    }
}

/// Positive once the retry metadata shows `threshold` or more consecutive
/// deserialization-flavored failures.
pub struct RepeatedDeserializationFailure {
    threshold: u32,
}

impl RepeatedDeserializationFailure {
    /// Build a detector that fires once `threshold` attempts failed with an
    /// error message mentioning deserialization.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl PoisonDetector for RepeatedDeserializationFailure {
    async fn is_poison(&self, attempts: &AttemptInfo) -> PoisonDetectionResult {
        let Some(ref metadata) = attempts.retry_metadata else {
            return PoisonDetectionResult::clean(self.name());
        };
        let count = metadata
            .failed_attempts
            .iter()
            .filter(|a| {
                let lower = a.error.to_lowercase();
                lower.contains("deserializ") || lower.contains("parse")
            })
            .count() as u32;
        if count >= self.threshold {
            PoisonDetectionResult::poison(self.name(), DeadLetterReason::DeserializationFailed)
                .with_detail("matchingFailures", count)
        } else {
            PoisonDetectionResult::clean(self.name())
        }
    }

    fn name(&self) -> &str {
        "RepeatedDeserializationFailure"
    }
}

/// Runs a chain of detectors in order; the first positive verdict wins.
pub struct CompositePoisonDetector {
    detectors: Vec<Box<dyn PoisonDetector>>,
}

impl Default for CompositePoisonDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositePoisonDetector {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self { detectors: Vec::new() }
    }

    /// Append a detector, builder-style.
    #[must_use]
    pub fn with_detector(mut self, detector: impl PoisonDetector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    /// Evaluate every detector in order, returning the first positive
    /// verdict, or a negative verdict from the last detector run (or a
    /// synthetic clean verdict if the chain is empty).
    pub async fn is_poison(&self, attempts: &AttemptInfo) -> PoisonDetectionResult {
        let mut last = PoisonDetectionResult::clean("composite");
        for detector in &self.detectors {
            let verdict = detector.is_poison(attempts).await;
            if verdict.is_poison {
                return verdict;
            }
            last = verdict;
        }
        last
    }
}
