// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for the middleware pipeline: stage ordering is
//! deterministic regardless of registration order, and a short-circuiting
//! middleware always prevents every later stage (and the handler) from
//! running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conduit_core::{DispatchResult, MessageBuilder, MessageContext, MessageKind, MessageKindMask};
use conduit_middleware::{CancellationToken, Middleware, Next, PipelineBuilder, Stage};
use proptest::prelude::*;

const ALL_STAGES: [Stage; 8] = [
    Stage::RateLimiting,
    Stage::Authentication,
    Stage::Authorization,
    Stage::Validation,
    Stage::Telemetry,
    Stage::ErrorHandling,
    Stage::Routing,
    Stage::Custom,
];

struct RecordingMiddleware {
    stage: Stage,
    index: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn name(&self) -> &str {
        "recording"
    }

    async fn invoke(&self, message: &mut conduit_core::Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        self.log.lock().unwrap().push(self.index);
        next.call(message, context).await
    }
}

/// A permutation of the 8 canonical stages, each tagged with the
/// registration index it was pushed at. Built by sorting the fixed stage
/// list against a vector of random sort keys, so the result is always a
/// full permutation of `ALL_STAGES` regardless of key collisions.
fn arb_stage_permutation() -> impl Strategy<Value = Vec<(Stage, usize)>> {
    proptest::collection::vec(any::<u32>(), ALL_STAGES.len()).prop_map(|keys| {
        let mut order: Vec<usize> = (0..ALL_STAGES.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        order.into_iter().enumerate().map(|(index, stage_i)| (ALL_STAGES[stage_i], index)).collect()
    })
}

proptest! {
    /// However the 8 stages are registered, the recorded invocation order
    /// always comes back sorted by each stage's fixed ordinal — the
    /// registration-order index only breaks ties within the same stage,
    /// which no two of these distinct stages share.
    #[test]
    fn stage_invocation_order_is_always_canonical(perm in arb_stage_permutation()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipelineBuilder::new();
        // expected canonical order, independent of registration order
        let mut by_ordinal = perm.clone();
        by_ordinal.sort_by_key(|(stage, _)| stage.ordinal());
        let expected_stages: Vec<Stage> = by_ordinal.iter().map(|(s, _)| *s).collect();

        for (stage, index) in &perm {
            builder = builder.middleware(RecordingMiddleware { stage: *stage, index: *index, log: Arc::clone(&log) });
        }
        let pipeline = builder.build();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(async {
            let mut message = MessageBuilder::new("Proptest", MessageKind::Action).build();
            let mut context = MessageContext::new(message.id.clone());
            let cancel = CancellationToken::new();
            pipeline
                .dispatch(&mut message, &mut context, cancel, |_m, _c| async { DispatchResult::ok() })
                .await
        });
        prop_assert!(result.succeeded());

        let recorded = log.lock().unwrap();
        let recorded_stages: Vec<Stage> = recorded.iter().map(|i| perm[*i].0).collect();
        prop_assert_eq!(recorded_stages, expected_stages);
    }
}

struct ShortCircuitAt {
    stage: Stage,
    trip: Stage,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Middleware for ShortCircuitAt {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn applicable_kinds(&self) -> MessageKindMask {
        MessageKindMask::ALL
    }

    fn name(&self) -> &str {
        "short-circuit-at"
    }

    async fn invoke(&self, message: &mut conduit_core::Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stage == self.trip {
            return DispatchResult::RateLimitExceeded { retry_after_ms: 1 };
        }
        next.call(message, context).await
    }
}

proptest! {
    /// Whichever stage is chosen to short-circuit, no stage with a later
    /// ordinal ever runs and the handler is never invoked.
    #[test]
    fn short_circuit_stops_every_later_stage(trip_index in 0usize..ALL_STAGES.len()) {
        let trip = ALL_STAGES[trip_index];
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let mut builder = PipelineBuilder::new();
        for stage in ALL_STAGES {
            builder = builder.middleware(ShortCircuitAt { stage, trip, calls: Arc::clone(&calls) });
        }
        let pipeline = builder.build();
        let handler_calls_inner = Arc::clone(&handler_calls);

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(async {
            let mut message = MessageBuilder::new("Proptest", MessageKind::Action).build();
            let mut context = MessageContext::new(message.id.clone());
            let cancel = CancellationToken::new();
            pipeline
                .dispatch(&mut message, &mut context, cancel, move |_m, _c| {
                    let handler_calls = Arc::clone(&handler_calls_inner);
                    async move {
                        handler_calls.fetch_add(1, Ordering::SeqCst);
                        DispatchResult::ok()
                    }
                })
                .await
        });

        prop_assert!(!result.succeeded());
        prop_assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        let trip_ordinal = trip.ordinal();
        let expected_calls = ALL_STAGES.iter().filter(|s| s.ordinal() <= trip_ordinal).count();
        prop_assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }
}
