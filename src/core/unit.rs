//! # Unit of work: one input, one leased context, one body call.
//!
//! [`UnitOfWork::run`] executes the body against its input inside the leased context,
//! turns every outcome into at most one synthesized error event, and returns the
//! context to the pool.
//!
//! ## Outcome flow
//!
//! ```text
//! Ok(())                           → Completed  (context reused unless the run was cancelled)
//! Err(Fail)                        → Failed     → Error[UnitFailed]   (context reused)
//! Err(Fatal)                       → Failed     → Error[UnitFailed]   (context destroyed)
//! panic                            → Failed     → Error[UnitPanicked] (context destroyed)
//! Err(Canceled)                    → Cancelled  (no event, context destroyed)
//!
//! token cancelled mid-flight:
//!   context.request_stop()
//!   └─► wait up to stop_grace for the body
//!         ├─ body returned Ok        → Completed (context destroyed)
//!         ├─ body returned Err/panic → Cancelled (no event, context destroyed)
//!         └─ grace elapsed           → body future dropped → Cancelled (context destroyed)
//! ```
//!
//! ## Rules
//! - Failures never escape this boundary; sibling units are unaffected.
//! - Cancellation is not an error: no error event is written for it.
//! - The body future (and its handle on the context) is dropped **before** the lease
//!   is released, so a context is never referenced by two units.
//! - A context is never closed under a running body without a stop request first,
//!   even when the unit future itself is aborted.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::body::{Bindings, BodyRef, Invocation};
use crate::error::UnitError;
use crate::output::{ErrorCategory, ErrorRecord, Streams, UnitId};
use crate::pool::{ExecutionContext, Lease};

/// Error id written when a body returns `Fail` or `Fatal`.
pub(crate) const UNIT_FAILED: &str = "UnitFailed";
/// Error id written when a body panics.
pub(crate) const UNIT_PANICKED: &str = "UnitPanicked";

/// Terminal status of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitStatus {
    Completed,
    Failed,
    Cancelled,
}

/// What a finished unit reports back to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnitReport {
    pub(crate) id: UnitId,
    pub(crate) status: UnitStatus,
}

/// A body bound to one input and one leased context.
pub(crate) struct UnitOfWork<C: ExecutionContext, I, T> {
    id: UnitId,
    lease: Lease<C>,
    body: BodyRef<C, I, T>,
    input: I,
    streams: Streams<T>,
    bindings: Arc<Bindings>,
    stop_grace: Duration,
}

impl<C, I, T> UnitOfWork<C, I, T>
where
    C: ExecutionContext,
    I: Send + 'static,
    T: Send + 'static,
{
    /// Binds a body to its input and context. Runs nothing.
    pub(crate) fn bind(
        id: UnitId,
        lease: Lease<C>,
        body: BodyRef<C, I, T>,
        input: I,
        streams: Streams<T>,
    ) -> Self {
        Self {
            id,
            lease,
            body,
            input,
            streams,
            bindings: Arc::new(Bindings::default()),
            stop_grace: Duration::ZERO,
        }
    }

    /// Attaches the captured variables visible to the body.
    pub(crate) fn with_bindings(mut self, bindings: Arc<Bindings>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Sets how long the body may keep running after a stop request.
    pub(crate) fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Runs the body to completion (or until cancelled) and releases the context.
    pub(crate) async fn run(self, token: CancellationToken) -> UnitReport {
        let Self {
            id,
            lease,
            body,
            input,
            streams,
            bindings,
            stop_grace,
        } = self;

        let context = Arc::clone(lease.context());
        debug!(unit = %id, context = %lease.id(), body = body.name(), "unit started");
        // Dropped before `lease` if this future is aborted.
        let mut stop_guard = StopOnDrop::armed(Arc::clone(&context));

        let inv = Invocation {
            unit: id,
            input,
            context: Arc::clone(&context),
            streams: streams.clone(),
            bindings,
            token: token.clone(),
        };
        let runner = Arc::clone(&body);
        // Invoke lazily so a panic while building the future is caught as well.
        let mut fut = Box::pin(AssertUnwindSafe(async move { runner.invoke(inv).await }).catch_unwind());

        let mut stopped = false;
        let outcome = tokio::select! {
            biased;
            res = &mut fut => Some(res),
            _ = token.cancelled() => None,
        };
        let outcome = match outcome {
            Some(res) => {
                stop_guard.disarm();
                Some(res)
            }
            None => {
                stopped = true;
                stop_guard.fire();
                debug!(unit = %id, context = %lease.id(), "stop requested");
                if stop_grace.is_zero() {
                    None
                } else {
                    time::timeout(stop_grace, &mut fut).await.ok()
                }
            }
        };
        drop(fut);
        drop(context);

        let cancelled = stopped || token.is_cancelled();
        let (status, discard) = match outcome {
            Some(Ok(Ok(()))) => (UnitStatus::Completed, cancelled),
            Some(Ok(Err(UnitError::Canceled))) => (UnitStatus::Cancelled, true),
            Some(Ok(Err(e))) if stopped => {
                debug!(unit = %id, label = e.as_label(), "error after stop request ignored");
                (UnitStatus::Cancelled, true)
            }
            Some(Ok(Err(e))) => {
                warn!(unit = %id, body = body.name(), label = e.as_label(), reason = %e, "unit failed");
                let record = ErrorRecord::new(UNIT_FAILED, ErrorCategory::NotSpecified, e.as_message());
                report(&streams, record).await;
                (UnitStatus::Failed, e.poisons_context() || cancelled)
            }
            Some(Err(payload)) if stopped => {
                warn!(unit = %id, reason = %panic_message(payload.as_ref()), "unit panicked while stopping");
                (UnitStatus::Cancelled, true)
            }
            Some(Err(payload)) => {
                let reason = panic_message(payload.as_ref());
                warn!(unit = %id, body = body.name(), reason = %reason, "unit panicked");
                let record = ErrorRecord::new(
                    UNIT_PANICKED,
                    ErrorCategory::NotSpecified,
                    format!("panic: {reason}"),
                );
                report(&streams, record).await;
                (UnitStatus::Failed, true)
            }
            None => {
                debug!(unit = %id, grace = ?stop_grace, "body dropped after stop grace");
                (UnitStatus::Cancelled, true)
            }
        };

        debug!(unit = %id, context = %lease.id(), ?status, discard, "unit finished");
        lease.release(discard);
        UnitReport { id, status }
    }
}

/// Asks the context to stop when dropped while armed.
///
/// Covers a unit future aborted mid-body: the context sees `request_stop` before the
/// lease is dropped and closes it.
struct StopOnDrop<C: ExecutionContext> {
    context: Option<Arc<C>>,
}

impl<C: ExecutionContext> StopOnDrop<C> {
    fn armed(context: Arc<C>) -> Self {
        Self {
            context: Some(context),
        }
    }

    fn disarm(&mut self) {
        self.context = None;
    }

    fn fire(&mut self) {
        if let Some(context) = self.context.take() {
            context.request_stop();
        }
    }
}

impl<C: ExecutionContext> Drop for StopOnDrop<C> {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Writes a synthesized error event; a closed output only means nobody is listening.
async fn report<T: Send + 'static>(streams: &Streams<T>, record: ErrorRecord) {
    if streams.error(record).await.is_err() {
        debug!(unit = ?streams.unit(), "error event dropped: output closed");
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyFn;
    use crate::core::PoolConfig;
    use crate::output::{Multiplexer, OutputStream};
    use crate::pool::ResourcePool;
    use crate::test_support::{MockContext, MockFactory, Probe};

    fn setup() -> (ResourcePool<MockFactory>, Arc<Probe>, Multiplexer<u32>, OutputStream<u32>) {
        let factory = MockFactory::new();
        let probe = factory.probe();
        let cfg = PoolConfig {
            throttle_limit: 1,
            ..PoolConfig::default()
        };
        let pool = ResourcePool::new(factory, &cfg).unwrap();
        let (mux, stream) = Multiplexer::channel(None);
        (pool, probe, mux, stream)
    }

    async fn unit(
        pool: &ResourcePool<MockFactory>,
        mux: &Multiplexer<u32>,
        body: BodyRef<MockContext, u32, u32>,
        input: u32,
    ) -> UnitOfWork<MockContext, u32, u32> {
        let lease = pool.acquire(&CancellationToken::new()).await.unwrap();
        let id = UnitId(u64::from(input));
        UnitOfWork::bind(id, lease, body, input, mux.streams(id))
    }

    #[tokio::test]
    async fn test_success_reuses_context() {
        let (pool, probe, mux, mut stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("double", |inv: Invocation<MockContext, u32, u32>| async move {
            inv.streams.success(inv.input * 2).await?;
            Ok::<_, UnitError>(())
        });

        let report = unit(&pool, &mux, body, 21).await.run(CancellationToken::new()).await;
        assert_eq!(report.status, UnitStatus::Completed);
        assert_eq!(pool.idle(), 1);
        assert_eq!(probe.closed(), 0);

        let out = stream.recv().await.unwrap();
        assert_eq!(out.unit, Some(UnitId(21)));
        assert_eq!(out.event.into_success(), Some(42));
    }

    #[tokio::test]
    async fn test_fail_reports_once_and_keeps_context() {
        let (pool, _probe, mux, mut stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("fail", |_inv: Invocation<MockContext, u32, u32>| async move {
            Err::<(), _>(UnitError::fail("bad input"))
        });

        let report = unit(&pool, &mux, body, 1).await.run(CancellationToken::new()).await;
        drop(mux);
        assert_eq!(report.status, UnitStatus::Failed);
        assert_eq!(pool.idle(), 1);

        let out = stream.recv().await.unwrap();
        let record = out.event.as_error().unwrap();
        assert_eq!(record.error_id, UNIT_FAILED);
        assert!(record.message.contains("bad input"));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fatal_destroys_context() {
        let (pool, probe, mux, _stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("fatal", |_inv: Invocation<MockContext, u32, u32>| async move {
            Err::<(), _>(UnitError::fatal("engine corrupted"))
        });

        let report = unit(&pool, &mux, body, 1).await.run(CancellationToken::new()).await;
        assert_eq!(report.status, UnitStatus::Failed);
        assert_eq!(pool.idle(), 0);
        assert_eq!(probe.closed(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (pool, probe, mux, mut stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("panic", |inv: Invocation<MockContext, u32, u32>| async move {
            if inv.input > 0 {
                panic!("boom");
            }
            Ok::<_, UnitError>(())
        });

        let report = unit(&pool, &mux, body, 1).await.run(CancellationToken::new()).await;
        assert_eq!(report.status, UnitStatus::Failed);
        assert_eq!(probe.closed(), 1);

        let out = stream.recv().await.unwrap();
        let record = out.event.as_error().unwrap();
        assert_eq!(record.error_id, UNIT_PANICKED);
        assert_eq!(record.message, "panic: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_requests_stop_and_discards() {
        let (pool, probe, mux, mut stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("slow", |inv: Invocation<MockContext, u32, u32>| async move {
            tokio::select! {
                _ = inv.context.stopped() => Err(UnitError::Canceled),
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    inv.streams.success(1).await?;
                    Ok::<_, UnitError>(())
                }
            }
        });

        let token = CancellationToken::new();
        let task = tokio::spawn(
            unit(&pool, &mux, body, 1)
                .await
                .with_stop_grace(Duration::from_secs(1))
                .run(token.clone()),
        );
        drop(mux);
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let report = task.await.unwrap();
        assert_eq!(report.status, UnitStatus::Cancelled);
        assert_eq!(probe.stop_requests(), 1);
        assert_eq!(probe.closed(), 1);
        assert_eq!(pool.idle(), 0);
        // Cancellation is not an error: the stream closes with nothing in it.
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_body_dropped_after_grace() {
        let (pool, probe, mux, _stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("stuck", |_inv: Invocation<MockContext, u32, u32>| async move {
            futures::future::pending::<()>().await;
            Ok::<_, UnitError>(())
        });

        let token = CancellationToken::new();
        token.cancel();
        let started = tokio::time::Instant::now();
        let report = unit(&pool, &mux, body, 1)
            .await
            .with_stop_grace(Duration::from_millis(200))
            .run(token)
            .await;

        assert_eq!(report.status, UnitStatus::Cancelled);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(probe.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_unit_stops_context_before_close() {
        let (pool, probe, mux, _stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("busy", |inv: Invocation<MockContext, u32, u32>| async move {
            inv.context.enter();
            futures::future::pending::<()>().await;
            inv.context.exit();
            Ok::<_, UnitError>(())
        });

        let task = tokio::spawn(unit(&pool, &mux, body, 1).await.run(CancellationToken::new()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(probe.stop_requests(), 1);
        assert_eq!(probe.closed(), 1);
        assert_eq!(probe.closed_while_running(), 0);
        assert_eq!(pool.stats().live, 0);
    }

    #[tokio::test]
    async fn test_bindings_visible_to_body() {
        let (pool, _probe, mux, mut stream) = setup();
        let body: BodyRef<MockContext, u32, u32> = BodyFn::arc("scale", |inv: Invocation<MockContext, u32, u32>| async move {
            let factor = inv.bindings.get::<u32>("factor").copied().unwrap_or(1);
            inv.streams.success(inv.input * factor).await?;
            Ok::<_, UnitError>(())
        });

        let bindings = Arc::new(Bindings::new().with("factor", 10u32));
        unit(&pool, &mux, body, 4)
            .await
            .with_bindings(bindings)
            .run(CancellationToken::new())
            .await;
        assert_eq!(stream.recv().await.unwrap().event.into_success(), Some(40));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
