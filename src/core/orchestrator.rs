//! # Orchestrator: input queue → pool lease → unit → output queue.
//!
//! The [`Orchestrator`] owns the [`ResourcePool`], the input queue, the cancellation
//! signal and the lifecycle state. [`start`](Orchestrator::start) spawns a single
//! control loop that dispatches one unit per input item onto the runtime.
//!
//! ## High-level architecture
//! ```text
//! host ── enqueue(item) ──► input mpsc ──► control loop
//!                                            │
//!   loop (Running):                          │
//!     reap finished units (try_join_next)    │
//!     in-flight == limit? ─► wait-any (join_next)           ◄── suspension point
//!     input.recv()                                          ◄── suspension point
//!       └─ None (input completed) ─► Draining
//!     pool.acquire(token)                                   ◄── suspension point (throttle)
//!       ├─ Cancelled / Closed   ─► Cancelling ─► Draining
//!       └─ Create(err)          ─► Error[ProcessingTask] to output, next item
//!     UnitOfWork::bind(..).run(child token) ─► registry.spawn
//!
//!   Draining:
//!     join_next until empty (abort() drops the remaining futures)
//!     drop the multiplexer ─► output closes
//!     Completed ─► wait() returns RunSummary
//! ```
//!
//! ## Rules
//! - The number of in-flight units never exceeds `throttle_limit`: acquisition is the
//!   gate, and the loop also waits for a slot before taking the next item.
//! - Once the signal fires, blocked dequeue/acquire calls return immediately and
//!   remaining queued input is dropped; no context is handed out afterwards.
//! - Scheduling failures are reported and the loop continues.
//! - The output queue closes only after every unit has finished or been aborted.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::builder::OrchestratorBuilder;
use super::config::PoolConfig;
use super::registry::Registry;
use super::shutdown;
use super::signal::{CancellationSignal, StopReason};
use super::state::{OrchestratorState, RunOutcome, RunSummary, StateMachine};
use super::unit::{UnitOfWork, UnitReport, UnitStatus, panic_message};
use crate::body::{Bindings, BodyRef};
use crate::error::{AcquireError, EnqueueError, RuntimeError};
use crate::output::{ErrorCategory, ErrorRecord, Multiplexer, OutputStream, UnitId};
use crate::pool::{ContextFactory, PoolStats, ResourcePool};

/// Error id written for scheduling-level failures (no unit was started).
pub const PROCESSING_TASK: &str = "ProcessingTask";
/// Error id of the record carried by [`RunOutcome::TimedOut`].
pub const TIMEOUT_REACHED: &str = "TimeOutReached";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one shared body over a stream of inputs with bounded parallelism.
///
/// ## Example
/// ```rust
/// use parapipe::{
///     BodyFn, BodyRef, ContextError, ContextFactory, ExecutionContext, Invocation,
///     OrchestratorBuilder, PoolConfig, UnitError,
/// };
///
/// struct Session;
/// impl ExecutionContext for Session {
///     fn request_stop(&self) {}
///     fn close(&self) {}
/// }
///
/// struct Sessions;
/// #[async_trait::async_trait]
/// impl ContextFactory for Sessions {
///     type Context = Session;
///     async fn create(&self) -> Result<Session, ContextError> {
///         Ok(Session)
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let body: BodyRef<Session, u32, u32> =
///         BodyFn::arc("double", |inv: Invocation<Session, u32, u32>| async move {
///             inv.streams.success(inv.input * 2).await?;
///             Ok::<_, UnitError>(())
///         });
///
///     let orch = OrchestratorBuilder::new(PoolConfig::default()).build(Sessions, body)?;
///     let mut output = orch.start()?;
///     for n in 1..=3 {
///         orch.enqueue(n)?;
///     }
///     orch.complete_input();
///
///     let mut results = Vec::new();
///     while let Some(item) = output.recv().await {
///         results.extend(item.event.into_success());
///     }
///     results.sort_unstable();
///     assert_eq!(results, [2, 4, 6]);
///
///     let summary = orch.wait().await?;
///     assert!(summary.outcome.is_completed());
///     assert_eq!(summary.succeeded, 3);
///     Ok(())
/// }
/// ```
pub struct Orchestrator<F: ContextFactory, I, T> {
    cfg: PoolConfig,
    pool: Arc<ResourcePool<F>>,
    body: BodyRef<F::Context, I, T>,
    bindings: Arc<Bindings>,
    signal: CancellationSignal,
    hard_stop: CancellationToken,
    state: Arc<StateMachine>,
    input_tx: Mutex<Option<mpsc::UnboundedSender<I>>>,
    input_rx: Mutex<Option<mpsc::UnboundedReceiver<I>>>,
    summary: Arc<OnceLock<Result<RunSummary, RuntimeError>>>,
    started: AtomicBool,
}

impl<F, I, T> Orchestrator<F, I, T>
where
    F: ContextFactory,
    I: Send + 'static,
    T: Send + 'static,
{
    /// Shorthand for `OrchestratorBuilder::new(cfg).build(factory, body)`.
    pub fn new(
        cfg: PoolConfig,
        factory: F,
        body: BodyRef<F::Context, I, T>,
    ) -> Result<Self, RuntimeError> {
        OrchestratorBuilder::new(cfg).build(factory, body)
    }

    pub(crate) fn new_internal(
        cfg: PoolConfig,
        pool: ResourcePool<F>,
        body: BodyRef<F::Context, I, T>,
        bindings: Bindings,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            cfg,
            pool: Arc::new(pool),
            body,
            bindings: Arc::new(bindings),
            signal: CancellationSignal::new(),
            hard_stop: CancellationToken::new(),
            state: Arc::new(StateMachine::new()),
            input_tx: Mutex::new(Some(input_tx)),
            input_rx: Mutex::new(Some(input_rx)),
            summary: Arc::new(OnceLock::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Starts the control loop and returns the consuming end of the output queue.
    ///
    /// Must be called from within a Tokio runtime. The deadline (if any) starts now.
    /// A second call fails with [`RuntimeError::AlreadyStarted`].
    pub fn start(&self) -> Result<OutputStream<T>, RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted);
        }
        let input = lock(&self.input_rx)
            .take()
            .ok_or(RuntimeError::AlreadyStarted)?;
        let (mux, output) = Multiplexer::channel(self.cfg.output_bound());

        let deadline = self.cfg.deadline();
        let watchdog = deadline.map(|after| self.signal.arm_deadline(after));

        let control = ControlLoop {
            pool: Arc::clone(&self.pool),
            body: Arc::clone(&self.body),
            bindings: Arc::clone(&self.bindings),
            mux,
            input,
            signal: self.signal.clone(),
            hard_stop: self.hard_stop.clone(),
            state: Arc::clone(&self.state),
            registry: Registry::new(),
            limit: self.cfg.throttle_limit,
            stop_grace: self.cfg.stop_grace,
            deadline,
            next_unit: 1,
            summary: RunSummary::new(RunOutcome::Completed),
        };

        self.state.transition(OrchestratorState::Running);
        info!(
            throttle_limit = self.cfg.throttle_limit,
            always_fresh = self.cfg.always_fresh,
            body = self.body.name(),
            "orchestrator started"
        );

        let state = Arc::clone(&self.state);
        let summary = Arc::clone(&self.summary);
        tokio::spawn(async move {
            let res = AssertUnwindSafe(control.run()).catch_unwind().await;
            if let Some(watchdog) = watchdog {
                watchdog.abort();
            }
            match res {
                Ok(run) => {
                    let _ = summary.set(Ok(run));
                    state.transition(OrchestratorState::Completed);
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(reason = %reason, "control loop panicked");
                    let _ = summary.set(Err(RuntimeError::ControlLoopPanicked { reason }));
                    state.force_completed();
                }
            }
        });
        Ok(output)
    }

    /// Submits one input item.
    ///
    /// Items may be enqueued before [`start`](Self::start); they wait in the queue.
    pub fn enqueue(&self, item: I) -> Result<(), EnqueueError> {
        if self.signal.is_triggered() {
            return Err(EnqueueError::Cancelled);
        }
        match lock(&self.input_tx).as_ref() {
            Some(tx) => tx.send(item).map_err(|_| EnqueueError::Closed),
            None => Err(EnqueueError::Closed),
        }
    }

    /// Signals that no more input will arrive. Idempotent.
    ///
    /// Items already enqueued are still processed.
    pub fn complete_input(&self) {
        if lock(&self.input_tx).take().is_some() {
            debug!("input completed");
        }
    }

    /// Triggers the cancellation signal. In-flight units are asked to stop and the
    /// orchestrator drains them before completing.
    pub fn cancel(&self) {
        if self.signal.trigger(StopReason::Requested) {
            info!(reason = StopReason::Requested.as_label(), "cancellation requested");
        }
    }

    /// Cancels and abandons draining: in-flight unit futures are dropped and their
    /// contexts destroyed.
    pub fn abort(&self) {
        self.hard_stop.cancel();
        self.cancel();
    }

    /// Waits until the orchestrator reaches `Completed` and returns the run summary.
    pub async fn wait(&self) -> Result<RunSummary, RuntimeError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(RuntimeError::NotStarted);
        }
        self.state.completed().await;
        self.summary
            .get()
            .cloned()
            .unwrap_or(Err(RuntimeError::NotStarted))
    }

    /// Tears everything down: closes input, aborts a running invocation and waits for
    /// it to complete, then disposes the pool (every remaining context is closed once).
    ///
    /// In-flight units are asked to stop and dropped before the pool closes their
    /// contexts.
    pub async fn dispose(&self) {
        self.complete_input();
        lock(&self.input_rx).take();
        if self.started.load(Ordering::Acquire) && !self.state.current().is_terminal() {
            self.abort();
            if let Err(e) = self.wait().await {
                debug!(reason = %e, "run ended without summary during dispose");
            }
        }
        self.pool.dispose();
    }

    /// Spawns a watcher that cancels this invocation on SIGINT/SIGTERM/SIGQUIT
    /// (Ctrl-C elsewhere).
    ///
    /// The watcher exits on its own once the invocation completes or is cancelled by
    /// other means; the returned handle resolves then.
    pub fn cancel_on_shutdown_signal(&self) -> JoinHandle<()> {
        let signal = self.signal.clone();
        let state = self.state.subscribe();
        tokio::spawn(async move {
            shutdown::watch_stop(shutdown::os_stop_signal(), signal, state).await;
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OrchestratorState {
        self.state.current()
    }

    /// A receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// The invocation's cancellation signal.
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    /// Snapshot of pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }
}

impl<F: ContextFactory, I, T> Drop for Orchestrator<F, I, T> {
    fn drop(&mut self) {
        if !self.state.current().is_terminal() {
            self.signal.trigger(StopReason::Requested);
        }
    }
}

/// State moved into the spawned control loop.
struct ControlLoop<F: ContextFactory, I, T> {
    pool: Arc<ResourcePool<F>>,
    body: BodyRef<F::Context, I, T>,
    bindings: Arc<Bindings>,
    mux: Multiplexer<T>,
    input: mpsc::UnboundedReceiver<I>,
    signal: CancellationSignal,
    hard_stop: CancellationToken,
    state: Arc<StateMachine>,
    registry: Registry,
    limit: usize,
    stop_grace: Duration,
    deadline: Option<Duration>,
    next_unit: u64,
    summary: RunSummary,
}

impl<F, I, T> ControlLoop<F, I, T>
where
    F: ContextFactory,
    I: Send + 'static,
    T: Send + 'static,
{
    async fn run(mut self) -> RunSummary {
        let token = self.signal.token().clone();

        loop {
            while let Some(report) = self.registry.try_join_next() {
                self.record(report);
            }

            if self.registry.len() >= self.limit {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    joined = self.registry.join_next() => {
                        if let Some(report) = joined {
                            self.record(report);
                        }
                    }
                }
                continue;
            }

            let item = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = self.input.recv() => item,
            };
            let Some(item) = item else {
                debug!("input exhausted");
                break;
            };

            if !self.dispatch(item, &token).await {
                break;
            }
        }

        if token.is_cancelled() {
            self.state.transition(OrchestratorState::Cancelling);
        }
        self.input.close();
        self.state.transition(OrchestratorState::Draining);
        self.drain(&token).await;

        self.summary.outcome = match self.signal.reason() {
            None => RunOutcome::Completed,
            Some(StopReason::Requested) => RunOutcome::Cancelled,
            Some(StopReason::Deadline) => RunOutcome::TimedOut(self.timeout_record()),
        };
        info!(
            dispatched = self.summary.dispatched,
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            cancelled = self.summary.cancelled,
            scheduling_errors = self.summary.scheduling_errors,
            "run finished"
        );
        // Dropping `self` drops the last multiplexer handle and closes the output.
        self.summary.clone()
    }

    /// Leases a context and starts one unit. Returns `false` when the loop must stop.
    async fn dispatch(&mut self, item: I, token: &CancellationToken) -> bool {
        let lease = match self.pool.acquire(token).await {
            Ok(lease) => lease,
            Err(AcquireError::Cancelled) | Err(AcquireError::Closed) => return false,
            Err(err) => {
                self.scheduling_error(&err).await;
                return true;
            }
        };

        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        let unit = UnitOfWork::bind(id, lease, Arc::clone(&self.body), item, self.mux.streams(id))
            .with_bindings(Arc::clone(&self.bindings))
            .with_stop_grace(self.stop_grace);
        self.registry.spawn(id, unit.run(token.child_token()));
        self.summary.dispatched += 1;
        true
    }

    /// Waits for every in-flight unit, reacting to late cancellation and hard stop.
    async fn drain(&mut self, token: &CancellationToken) {
        let mut cancel_seen = token.is_cancelled();
        let mut aborted = false;
        loop {
            if !aborted && self.hard_stop.is_cancelled() {
                aborted = true;
                self.registry.abort_all();
            }
            tokio::select! {
                biased;
                _ = token.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    self.state.transition(OrchestratorState::Cancelling);
                    self.state.transition(OrchestratorState::Draining);
                }
                _ = self.hard_stop.cancelled(), if !aborted => {}
                joined = self.registry.join_next() => match joined {
                    Some(report) => self.record(report),
                    None => break,
                },
            }
        }
    }

    fn record(&mut self, report: UnitReport) {
        match report.status {
            UnitStatus::Completed => self.summary.succeeded += 1,
            UnitStatus::Failed => self.summary.failed += 1,
            UnitStatus::Cancelled => self.summary.cancelled += 1,
        }
    }

    async fn scheduling_error(&mut self, err: &AcquireError) {
        self.summary.scheduling_errors += 1;
        error!(label = err.as_label(), reason = %err, "failed to schedule unit");
        let record = ErrorRecord::new(
            PROCESSING_TASK,
            ErrorCategory::ResourceUnavailable,
            err.as_message(),
        );
        let streams = self.mux.scheduler_streams();
        let token = self.signal.token();
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            res = streams.error(record) => {
                if res.is_err() {
                    debug!("scheduling error dropped: output closed");
                }
            }
        }
    }

    fn timeout_record(&self) -> ErrorRecord {
        let message = match self.deadline {
            Some(d) => format!("timeout of {d:?} reached, remaining units were stopped"),
            None => "timeout reached".to_string(),
        };
        ErrorRecord::new(TIMEOUT_REACHED, ErrorCategory::OperationTimeout, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyFn, Invocation};
    use crate::error::UnitError;
    use crate::test_support::{MockContext, MockFactory};

    fn cfg(limit: usize) -> PoolConfig {
        PoolConfig {
            throttle_limit: limit,
            ..PoolConfig::default()
        }
    }

    fn double() -> BodyRef<MockContext, u32, u32> {
        BodyFn::arc("double", |inv: Invocation<MockContext, u32, u32>| async move {
            inv.streams.success(inv.input * 2).await?;
            Ok::<_, UnitError>(())
        })
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        let orch = Orchestrator::new(cfg(1), MockFactory::new(), double()).unwrap();
        assert_eq!(orch.wait().await.unwrap_err(), RuntimeError::NotStarted);
        assert_eq!(orch.state(), OrchestratorState::Idle);

        let _out = orch.start().unwrap();
        assert!(matches!(orch.start(), Err(RuntimeError::AlreadyStarted)));
        orch.complete_input();
        orch.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_input_closed_after_complete() {
        let orch = Orchestrator::new(cfg(1), MockFactory::new(), double()).unwrap();
        orch.enqueue(1).unwrap();
        orch.complete_input();
        assert_eq!(orch.enqueue(2), Err(EnqueueError::Closed));

        let mut out = orch.start().unwrap();
        assert_eq!(out.recv().await.unwrap().event.into_success(), Some(2));
        assert!(out.recv().await.is_none());
        orch.wait().await.unwrap();
        assert_eq!(orch.state(), OrchestratorState::Completed);
    }

    #[tokio::test]
    async fn test_scheduling_error_reported_and_loop_continues() {
        let factory = MockFactory::new().failing_first(1);
        let orch = Orchestrator::new(cfg(1), factory, double()).unwrap();
        let mut out = orch.start().unwrap();
        orch.enqueue(1).unwrap();
        orch.enqueue(2).unwrap();
        orch.complete_input();

        let first = out.recv().await.unwrap();
        assert_eq!(first.unit, None);
        let record = first.event.as_error().unwrap();
        assert_eq!(record.error_id, PROCESSING_TASK);
        assert_eq!(record.category, ErrorCategory::ResourceUnavailable);

        assert_eq!(out.recv().await.unwrap().event.into_success(), Some(4));
        let summary = orch.wait().await.unwrap();
        assert_eq!(summary.scheduling_errors, 1);
        assert_eq!(summary.dispatched, 1);
        assert!(summary.outcome.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_completion_keeps_outcome() {
        let orch = Orchestrator::new(cfg(2), MockFactory::new(), double()).unwrap();
        let _out = orch.start().unwrap();
        orch.complete_input();
        let summary = orch.wait().await.unwrap();
        orch.cancel();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(orch.enqueue(1), Err(EnqueueError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timed_out() {
        let body: BodyRef<MockContext, u32, u32> =
            BodyFn::arc("sleepy", |inv: Invocation<MockContext, u32, u32>| async move {
                tokio::select! {
                    _ = inv.token.cancelled() => Err(UnitError::Canceled),
                    _ = tokio::time::sleep(Duration::from_secs(5)) => Ok::<_, UnitError>(()),
                }
            });
        let config = PoolConfig {
            throttle_limit: 1,
            timeout: Duration::from_secs(1),
            ..PoolConfig::default()
        };
        let orch = Orchestrator::new(config, MockFactory::new(), body).unwrap();
        let _out = orch.start().unwrap();
        orch.enqueue(1).unwrap();
        orch.complete_input();

        let summary = orch.wait().await.unwrap();
        match summary.outcome {
            RunOutcome::TimedOut(record) => {
                assert_eq!(record.error_id, TIMEOUT_REACHED);
                assert_eq!(record.category, ErrorCategory::OperationTimeout);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(summary.cancelled, 1);
    }

    #[tokio::test]
    async fn test_shutdown_watcher_exits_with_the_run() {
        let orch = Orchestrator::new(cfg(1), MockFactory::new(), double()).unwrap();
        let _out = orch.start().unwrap();
        let watcher = orch.cancel_on_shutdown_signal();
        orch.enqueue(1).unwrap();
        orch.complete_input();

        let summary = orch.wait().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .expect("watcher outlived the run")
            .unwrap();
        assert!(summary.outcome.is_completed());
        assert!(!orch.signal().is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_drops_unresponsive_units() {
        let body: BodyRef<MockContext, u32, u32> =
            BodyFn::arc("stuck", |_inv: Invocation<MockContext, u32, u32>| async move {
                futures::future::pending::<()>().await;
                Ok::<_, UnitError>(())
            });
        let factory = MockFactory::new();
        let probe = factory.probe();
        let orch = Orchestrator::new(cfg(2), factory, body).unwrap();
        let _out = orch.start().unwrap();
        orch.enqueue(1).unwrap();
        orch.enqueue(2).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        orch.abort();
        let summary = orch.wait().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(probe.closed(), 2);
        assert!(probe.no_double_close());
    }
}
