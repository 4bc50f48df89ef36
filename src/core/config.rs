//! # Invocation configuration.
//!
//! Provides [`PoolConfig`] centralized settings for one pipeline run.
//!
//! PoolConfig is used in two ways:
//! 1. **Pool creation**: `ResourcePool::new(factory, &config)`
//! 2. **Orchestrator creation**: `OrchestratorBuilder::new(config)`
//!
//! ## Sentinel values
//! - `timeout = 0s` → no deadline (the cancellation signal only fires on request)
//! - `output_capacity = 0` → unbounded output queue (producers never wait)
//! - `stop_grace = 0s` → a stopped unit's body is dropped right after the stop request

use std::time::Duration;

use crate::error::RuntimeError;

/// Configuration for one pipeline invocation.
///
/// ## Field semantics
/// - `throttle_limit`: maximum number of units (and contexts) in flight (`0` rejected)
/// - `always_fresh`: destroy every context after one use instead of pooling it
/// - `timeout`: deadline for the whole invocation (`0s` = none)
/// - `output_capacity`: output queue bound (`0` = unbounded)
/// - `stop_grace`: how long a cancelled unit may keep running after its stop request
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of concurrently leased contexts.
    ///
    /// Must be at least 1; [`validate`](Self::validate) rejects `0`.
    pub throttle_limit: usize,

    /// Never reuse a context.
    ///
    /// When set, every released context is destroyed; the next acquire builds a new one.
    pub always_fresh: bool,

    /// Deadline for the whole invocation, measured from `start`.
    ///
    /// - `Duration::ZERO` = no deadline
    /// - `> 0` = the cancellation signal fires automatically after this long
    pub timeout: Duration,

    /// Capacity of the shared output queue.
    ///
    /// - `0` = unbounded (emission never waits, memory grows with a slow consumer)
    /// - `n > 0` = emission waits while `n` items are undelivered
    pub output_capacity: usize,

    /// Grace period granted to a unit after its context was asked to stop.
    ///
    /// - `Duration::ZERO` = the body future is dropped right after the stop request
    /// - `> 0` = the body may finish within this window; then it is dropped
    ///
    /// In both cases the context is destroyed.
    pub stop_grace: Duration,
}

impl PoolConfig {
    /// Returns the invocation deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → auto-cancel after `d`
    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the output queue bound as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` undelivered items
    #[inline]
    pub fn output_bound(&self) -> Option<usize> {
        if self.output_capacity == 0 {
            None
        } else {
            Some(self.output_capacity)
        }
    }

    /// Checks the configuration before any work starts.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.throttle_limit == 0 {
            return Err(RuntimeError::InvalidThrottleLimit {
                limit: self.throttle_limit,
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `throttle_limit = 5`
    /// - `always_fresh = false` (contexts are pooled)
    /// - `timeout = 0s` (no deadline)
    /// - `output_capacity = 0` (unbounded)
    /// - `stop_grace = 0s` (a stopped body is dropped at once)
    fn default() -> Self {
        Self {
            throttle_limit: 5,
            always_fresh: false,
            timeout: Duration::from_secs(0),
            output_capacity: 0,
            stop_grace: Duration::ZERO,
        }
    }
}
