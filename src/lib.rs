//! # parapipe
//!
//! **Parapipe** runs one shared unit of work over a stream of input items, in parallel,
//! with a hard bound on concurrency and a pool of costly, reusable execution contexts.
//!
//! It provides primitives to lease contexts, run bodies against them, merge every
//! unit's typed output into one ordered queue, and stop the whole invocation on
//! request or on a deadline.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   host ── enqueue(item) ─┐                        ┌─► OutputStream (recv / try_next /
//!                          ▼                        │                 blocking_iter / Stream)
//! ┌───────────────────────────────────────────────┐ │
//! │  Orchestrator (control loop)                  │ │
//! │  - input queue (mpsc)                         │ │
//! │  - CancellationSignal (cancel / deadline)     │ │
//! │  - Registry (in-flight units, JoinSet)        │ │
//! └──────┬───────────────────────┬────────────────┘ │
//!        │ acquire(token)        │ spawn            │
//!        ▼                       ▼                  │
//! ┌──────────────────┐   ┌──────────────────────┐   │
//! │  ResourcePool    │──►│  UnitOfWork::run     │   │
//! │  - Semaphore     │   │  - Body::invoke      │   │
//! │  - idle stack    │◄──│  - catch panics      │   │
//! │  - live set      │   │  - request_stop on   │   │
//! └──────────────────┘   │    cancellation      │   │
//!   Lease::release       └──────────┬───────────┘   │
//!                                   │ Streams       │
//!                                   ▼               │
//!                        ┌──────────────────────┐   │
//!                        │  Multiplexer (mpsc)  │───┘
//!                        └──────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──start()──► Running
//!   loop {
//!     ├─► in-flight == limit ─► wait for any unit
//!     ├─► next input item (None ─► Draining)
//!     ├─► pool.acquire(token)       (suspends while all contexts are leased)
//!     │     └─ Create error ─► Error[ProcessingTask], continue
//!     └─► spawn UnitOfWork::run(child token)
//!           ├─ Ok          ─► context back to idle (or destroyed when always-fresh)
//!           ├─ Fail/Fatal  ─► Error[UnitFailed]
//!           ├─ panic       ─► Error[UnitPanicked]
//!           └─ cancelled   ─► request_stop, context destroyed, no error event
//!   }
//! Cancelling (cancel / deadline) ─► Draining ─► output closed ─► Completed
//! ```
//!
//! ## Features
//! | Area             | Description                                                      | Key types / traits                                   |
//! |------------------|------------------------------------------------------------------|------------------------------------------------------|
//! | **Orchestration**| Bounded parallel dispatch, draining, cancellation, deadline.     | [`Orchestrator`], [`OrchestratorBuilder`]            |
//! | **Contexts**     | Lazily built, reusable or always-fresh execution contexts.       | [`ResourcePool`], [`ExecutionContext`], [`ContextFactory`], [`Lease`] |
//! | **Bodies**       | The unit of work, as a trait or a closure.                       | [`Body`], [`BodyFn`], [`Invocation`], [`Bindings`]   |
//! | **Output**       | Seven typed channels merged into one queue.                      | [`OutputEvent`], [`Streams`], [`OutputStream`]       |
//! | **Errors**       | Typed errors for construction, lifecycle and unit execution.     | [`RuntimeError`], [`UnitError`], [`AcquireError`]    |
//! | **Configuration**| Centralize invocation settings.                                  | [`PoolConfig`]                                       |
//!
//! ## Example
//! ```rust
//! use parapipe::{
//!     BodyFn, BodyRef, ContextError, ContextFactory, ExecutionContext, Invocation,
//!     Orchestrator, PoolConfig, UnitError,
//! };
//!
//! struct Interpreter;
//! impl ExecutionContext for Interpreter {
//!     fn request_stop(&self) {}
//!     fn close(&self) {}
//! }
//!
//! struct Interpreters;
//! #[async_trait::async_trait]
//! impl ContextFactory for Interpreters {
//!     type Context = Interpreter;
//!     async fn create(&self) -> Result<Interpreter, ContextError> {
//!         Ok(Interpreter)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = PoolConfig::default();
//!     cfg.throttle_limit = 2;
//!
//!     let greet: BodyRef<Interpreter, String, String> =
//!         BodyFn::arc("greet", |inv: Invocation<Interpreter, String, String>| async move {
//!             inv.streams.verbose(format!("greeting {}", inv.input)).await?;
//!             inv.streams.success(format!("hello, {}", inv.input)).await?;
//!             Ok::<_, UnitError>(())
//!         });
//!
//!     let orch = Orchestrator::new(cfg, Interpreters, greet)?;
//!     let mut output = orch.start()?;
//!     for name in ["ada", "grace"] {
//!         orch.enqueue(name.to_string())?;
//!     }
//!     orch.complete_input();
//!
//!     while let Some(item) = output.recv().await {
//!         println!("{:?} {:?}", item.unit, item.event);
//!     }
//!     let summary = orch.wait().await?;
//!     assert_eq!(summary.succeeded, 2);
//!     Ok(())
//! }
//! ```
mod body;
mod core;
mod error;
mod output;
mod pool;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use body::{Bindings, Body, BodyFn, BodyRef, BoxBodyFuture, Invocation};
pub use self::core::{
    CancellationSignal, Orchestrator, OrchestratorBuilder, OrchestratorState, PROCESSING_TASK,
    PoolConfig, RunOutcome, RunSummary, StopReason, TIMEOUT_REACHED,
};
pub use error::{AcquireError, ContextError, EnqueueError, OutputClosed, RuntimeError, UnitError};
pub use output::{
    ErrorCategory, ErrorRecord, InformationRecord, Multiplexer, Output, OutputEvent, OutputKind,
    OutputStream, ProgressRecord, Streams, UnitId,
};
pub use pool::{ContextFactory, ContextId, ExecutionContext, Lease, PoolStats, ResourcePool};
