//! # Resource pool of execution contexts.
//!
//! - [`ExecutionContext`] / [`ContextFactory`] the seam to the execution engine
//! - [`ResourcePool`] bounded, lazily-filled pool gated by a semaphore
//! - [`Lease`] one checked-out context; releases itself on drop
//! - [`PoolStats`] counters for observability and leak checks

mod context;
mod lease;
#[allow(clippy::module_inception)]
mod pool;
mod stats;

pub use context::{ContextFactory, ContextId, ExecutionContext};
pub use lease::Lease;
pub use pool::ResourcePool;
pub use stats::PoolStats;
