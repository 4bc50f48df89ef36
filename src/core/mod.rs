//! Runtime core: configuration, orchestration and lifecycle.
//!
//! The public API from this module is [`Orchestrator`] (with [`OrchestratorBuilder`]),
//! its [`PoolConfig`], the [`CancellationSignal`] and the lifecycle/outcome types.
//!
//! Internal modules:
//! - [`unit`]: runs one body against one input inside a leased context;
//! - [`registry`]: tracks in-flight units and turns join results into reports;
//! - [`orchestrator`]: control loop, admission, draining and cancellation;
//! - [`state`]: lifecycle state machine and run summary;
//! - [`signal`]: one-shot cancellation with stop reason and deadline watchdog;
//! - [`shutdown`]: cross-platform OS stop signal handling.

mod builder;
mod config;
mod orchestrator;
mod registry;
mod shutdown;
mod signal;
mod state;
mod unit;

pub use builder::OrchestratorBuilder;
pub use config::PoolConfig;
pub use orchestrator::{Orchestrator, PROCESSING_TASK, TIMEOUT_REACHED};
pub use signal::{CancellationSignal, StopReason};
pub use state::{OrchestratorState, RunOutcome, RunSummary};
