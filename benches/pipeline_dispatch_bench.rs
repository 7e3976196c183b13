// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for middleware pipeline dispatch throughput as the
//! registered middleware count grows.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use async_trait::async_trait;
use conduit_core::{DispatchResult, Message, MessageBuilder, MessageContext, MessageKind};
use conduit_middleware::{CancellationToken, Middleware, Next, Pipeline, PipelineBuilder, Stage};

struct PassThrough(Stage, &'static str);

#[async_trait]
impl Middleware for PassThrough {
    fn stage(&self) -> Stage {
        self.0
    }

    fn name(&self) -> &str {
        self.1
    }

    async fn invoke(&self, message: &mut Message, context: &mut MessageContext, next: Next<'_>) -> DispatchResult {
        next.call(message, context).await
    }
}

fn build_pipeline(depth: usize) -> Pipeline {
    let stages = [
        Stage::RateLimiting,
        Stage::Authentication,
        Stage::Authorization,
        Stage::Validation,
        Stage::Telemetry,
        Stage::ErrorHandling,
        Stage::Routing,
        Stage::Custom,
    ];
    let mut builder = PipelineBuilder::new();
    for i in 0..depth {
        builder = builder.middleware(PassThrough(stages[i % stages.len()], "pass-through"));
    }
    builder.build()
}

fn bench_dispatch_by_middleware_count(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_dispatch_by_depth");
    group.throughput(Throughput::Elements(1));

    for depth in [0usize, 4, 8, 16] {
        let pipeline = build_pipeline(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &pipeline, |b, pipeline| {
            b.iter(|| {
                rt.block_on(async {
                    let mut message = MessageBuilder::new("OrderCreated", MessageKind::Action).build();
                    let mut context = MessageContext::new(message.id.clone());
                    black_box(
                        pipeline
                            .dispatch(&mut message, &mut context, CancellationToken::new(), |_, _| {
                                Box::pin(async { DispatchResult::ok() })
                            })
                            .await,
                    )
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_by_middleware_count);
criterion_main!(benches);
