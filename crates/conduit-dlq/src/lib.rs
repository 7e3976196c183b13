// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-dlq
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Poison-message detection, the dead-letter queue, the poison handler,
//! and the retry/backoff helper the outer pipeline uses before giving up
//! on a message.

/// Exponential backoff with jitter and an overall-timeout budget.
pub mod retry;

/// Poison detectors and their composition.
pub mod poison;

/// Dead-letter storage backends.
pub mod store;

/// The dead-letter queue itself.
pub mod queue;

/// The poison handler tying detection to quarantine.
pub mod handler;

pub use handler::{PoisonHandler, PoisonHandlerConfig};
pub use poison::{
    AttemptInfo, CompositePoisonDetector, MaxRetriesExceeded, MessageAgeExceeded, PoisonDetectionResult,
    PoisonDetector, RepeatedDeserializationFailure,
};
pub use queue::{DeadLetterQueue, EnqueueRequest, ReplayHandler};
pub use retry::{compute_delay, retry_async, RetryAttempt, RetryConfig, RetryMetadata, RetryOutcome};
pub use store::{DeadLetterStatistics, DeadLetterStore, InMemoryDeadLetterStore, NullDeadLetterStore};
