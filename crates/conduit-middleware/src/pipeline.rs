// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ordered middleware pipeline: composition, dispatch, and
//! short-circuiting.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::{Message, MessageContext, MessageKindMask};
use tracing::debug;

use crate::cancel::CancellationToken;

/// A boxed, `Send` future — used for the terminal handler and the
/// recursive chain driver, since an `async fn` cannot call itself directly.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The canonical, fixed ordering middleware are grouped and executed in.
/// Execution within a stage is stable (registration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Admission control / backpressure.
    RateLimiting,
    /// Principal verification (JWT).
    Authentication,
    /// Permission checks on an authenticated principal.
    Authorization,
    /// Input validation.
    Validation,
    /// Metrics/tracing instrumentation.
    Telemetry,
    /// Converts thrown errors into typed results; drives DLQ routing.
    ErrorHandling,
    /// Transport/endpoint resolution.
    Routing,
    /// Anything else, runs last.
    Custom,
}

impl Stage {
    /// The canonical ordinal used to sort middleware before composition.
    #[must_use]
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::RateLimiting => 0,
            Self::Authentication => 1,
            Self::Authorization => 2,
            Self::Validation => 3,
            Self::Telemetry => 4,
            Self::ErrorHandling => 5,
            Self::Routing => 6,
            Self::Custom => 7,
        }
    }
}

/// A single pipeline stage's contract.
///
/// A middleware MUST either (a) call `next` exactly zero or one times and
/// return its result (possibly wrapped), or (b) return a typed failure
/// result that short-circuits the rest of the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Which canonical [`Stage`] this middleware belongs to.
    fn stage(&self) -> Stage;

    /// Which message kinds this middleware applies to. Defaults to all
    /// kinds.
    fn applicable_kinds(&self) -> MessageKindMask {
        MessageKindMask::ALL
    }

    /// Human-readable name used in tracing output.
    fn name(&self) -> &str;

    /// Process the message, optionally delegating to the rest of the
    /// chain via `next`.
    async fn invoke(
        &self,
        message: &mut Message,
        context: &mut MessageContext,
        next: Next<'_>,
    ) -> conduit_core::DispatchResult;
}

/// Callers receive the remainder of the chain as a `Next` handle, used to
/// continue to the next stage (or the terminal handler).
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    handler: &'a HandlerFn<'a>,
    cancel: CancellationToken,
}

/// The terminal handler-dispatch function the chain bottoms out into.
pub type HandlerFn<'a> =
    dyn Fn(&mut Message, &mut MessageContext) -> BoxFuture<'a, conduit_core::DispatchResult>
        + Send
        + Sync
        + 'a;

impl<'a> Next<'a> {
    /// Whether the dispatch's cancellation token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The cancellation token for this dispatch.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Continue to the next middleware (or the terminal handler).
    pub fn call(
        self,
        message: &'a mut Message,
        context: &'a mut MessageContext,
    ) -> BoxFuture<'a, conduit_core::DispatchResult> {
        run_chain(self.rest, message, context, self.handler, self.cancel)
    }
}

/// Drives the composed chain: cancellation check, then either the next
/// applicable middleware or the terminal handler.
fn run_chain<'a>(
    chain: &'a [Arc<dyn Middleware>],
    message: &'a mut Message,
    context: &'a mut MessageContext,
    handler: &'a HandlerFn<'a>,
    cancel: CancellationToken,
) -> BoxFuture<'a, conduit_core::DispatchResult> {
    Box::pin(async move {
        if cancel.is_cancelled() {
            return conduit_core::DispatchResult::Cancelled;
        }
        match chain.split_first() {
            None => handler(message, context).await,
            Some((mw, rest)) => {
                debug!(target: "conduit.pipeline", stage = ?mw.stage(), middleware = mw.name(), "executing");
                let next = Next {
                    rest,
                    handler,
                    cancel,
                };
                mw.invoke(message, context, next).await
            }
        }
    })
}

/// An ordered chain of [`Middleware`] executed against a message and
/// terminating in a handler.
///
/// ```
/// use conduit_middleware::{Pipeline, PipelineBuilder};
///
/// let pipeline: Pipeline = PipelineBuilder::new().build();
/// assert_eq!(pipeline.len(), 0);
/// ```
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Number of registered middleware (across all stages).
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Compose the subset of middleware applicable to `kind`, grouped by
    /// [`Stage`] in canonical order and stable within a stage.
    ///
    /// This composition happens once per dispatch — the chain is not
    /// cacheable because the applicable set may vary by message kind.
    fn ordered_for(&self, kind: conduit_core::MessageKind) -> Vec<Arc<dyn Middleware>> {
        let mut indexed: Vec<(usize, Arc<dyn Middleware>)> = self
            .middleware
            .iter()
            .enumerate()
            .filter(|(_, mw)| mw.applicable_kinds().contains(kind))
            .map(|(i, mw)| (i, Arc::clone(mw)))
            .collect();
        indexed.sort_by_key(|(i, mw)| (mw.stage().ordinal(), *i));
        indexed.into_iter().map(|(_, mw)| mw).collect()
    }

    /// Run the pipeline against `message`/`context`, terminating in
    /// `handler` if every middleware calls `next`.
    pub async fn dispatch<H, Fut>(
        &self,
        message: &mut Message,
        context: &mut MessageContext,
        cancel: CancellationToken,
        handler: H,
    ) -> conduit_core::DispatchResult
    where
        H: Fn(&mut Message, &mut MessageContext) -> Fut + Send + Sync,
        Fut: Future<Output = conduit_core::DispatchResult> + Send,
    {
        if cancel.is_cancelled() {
            return conduit_core::DispatchResult::Cancelled;
        }
        let ordered = self.ordered_for(message.kind);
        let boxed_handler = move |m: &mut Message, c: &mut MessageContext| -> BoxFuture<'_, conduit_core::DispatchResult> {
            Box::pin(handler(m, c))
        };
        run_chain(&ordered, message, context, &boxed_handler, cancel).await
    }
}

/// Builder for [`Pipeline`]; preserves registration order.
#[derive(Default)]
pub struct PipelineBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware (builder pattern).
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Register an already-shared middleware.
    #[must_use]
    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Finalize the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            middleware: self.middleware,
        }
    }
}
