//! Error types used by the parapipe runtime, the resource pool and unit bodies.
//!
//! This module defines:
//!
//! - [`RuntimeError`]: errors raised by the orchestrator itself (misconfiguration, lifecycle misuse).
//! - [`UnitError`]: errors returned by a unit body.
//! - [`AcquireError`]: why a context lease could not be granted.
//! - [`EnqueueError`]: why an input item was refused.
//! - [`ContextError`]: failure reported by a [`ContextFactory`](crate::ContextFactory).
//! - [`OutputClosed`]: a write after the output consumer went away.
//!
//! Every enum provides `as_label` (stable snake_case, for logs) and `as_message`.

use thiserror::Error;

/// # Errors produced by the orchestration runtime.
///
/// These are never produced by a unit of work; per-unit faults travel through the
/// output stream as [`OutputEvent::Error`](crate::OutputEvent::Error).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The configured throttle limit is not a positive integer.
    #[error("invalid throttle limit {limit}: must be at least 1")]
    InvalidThrottleLimit {
        /// The rejected value.
        limit: usize,
    },

    /// [`Orchestrator::start`](crate::Orchestrator::start) was called more than once.
    #[error("orchestrator already started")]
    AlreadyStarted,

    /// A lifecycle call that requires a running orchestrator was made before `start`.
    #[error("orchestrator not started")]
    NotStarted,

    /// The control loop panicked; in-flight units were dropped.
    #[error("control loop panicked: {reason}")]
    ControlLoopPanicked {
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use parapipe::RuntimeError;
    ///
    /// let err = RuntimeError::InvalidThrottleLimit { limit: 0 };
    /// assert_eq!(err.as_label(), "runtime_invalid_throttle_limit");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidThrottleLimit { .. } => "runtime_invalid_throttle_limit",
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::NotStarted => "runtime_not_started",
            RuntimeError::ControlLoopPanicked { .. } => "runtime_control_loop_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::InvalidThrottleLimit { limit } => {
                format!("throttle limit {limit} is out of range (min 1)")
            }
            RuntimeError::AlreadyStarted => "start called twice".to_string(),
            RuntimeError::NotStarted => "orchestrator was never started".to_string(),
            RuntimeError::ControlLoopPanicked { reason } => format!("control loop panic: {reason}"),
        }
    }
}

/// # Errors returned by a unit body.
///
/// The variant decides what happens to the leased context afterwards:
///
/// | Variant    | Reported as error event | Context on release |
/// |------------|-------------------------|--------------------|
/// | `Fail`     | yes                     | reused             |
/// | `Fatal`    | yes                     | destroyed          |
/// | `Canceled` | no                      | destroyed          |
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The body failed; the context it ran in is still trustworthy.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The body failed and left its context in an unknown state.
    #[error("fatal error (context discarded): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The body observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl UnitError {
    /// Shorthand for [`UnitError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        UnitError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`UnitError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        UnitError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use parapipe::UnitError;
    ///
    /// assert_eq!(UnitError::fail("boom").as_label(), "unit_failed");
    /// assert_eq!(UnitError::Canceled.as_label(), "unit_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::Fail { .. } => "unit_failed",
            UnitError::Fatal { .. } => "unit_fatal",
            UnitError::Canceled => "unit_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            UnitError::Fail { error } => format!("error: {error}"),
            UnitError::Fatal { error } => format!("fatal: {error}"),
            UnitError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Whether the context that ran the failing body must not be reused.
    pub fn poisons_context(&self) -> bool {
        matches!(self, UnitError::Fatal { .. } | UnitError::Canceled)
    }
}

/// Failure reported by a [`ContextFactory`](crate::ContextFactory) while building a context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ContextError {
    message: String,
}

impl ContextError {
    /// Creates a new context error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// # Reasons a context lease could not be granted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The cancellation signal fired while waiting.
    #[error("acquire cancelled")]
    Cancelled,

    /// The pool was disposed.
    #[error("pool closed")]
    Closed,

    /// A new context had to be built and the factory failed.
    #[error("context creation failed: {0}")]
    Create(#[from] ContextError),
}

impl AcquireError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AcquireError::Cancelled => "acquire_cancelled",
            AcquireError::Closed => "acquire_pool_closed",
            AcquireError::Create(_) => "acquire_create_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            AcquireError::Cancelled => "cancelled while waiting for a context".to_string(),
            AcquireError::Closed => "pool is disposed".to_string(),
            AcquireError::Create(e) => format!("context creation failed: {e}"),
        }
    }
}

/// # Reasons an input item was refused by [`Orchestrator::enqueue`](crate::Orchestrator::enqueue).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Input was already completed (or the orchestrator was disposed).
    #[error("input closed")]
    Closed,

    /// The invocation was cancelled or timed out.
    #[error("invocation cancelled")]
    Cancelled,
}

impl EnqueueError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EnqueueError::Closed => "enqueue_closed",
            EnqueueError::Cancelled => "enqueue_cancelled",
        }
    }
}

/// Returned by output writes once the consumer has dropped its [`OutputStream`](crate::OutputStream).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("output stream closed")]
pub struct OutputClosed;

impl From<OutputClosed> for UnitError {
    fn from(_: OutputClosed) -> Self {
        UnitError::fail("output stream closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisons_context() {
        assert!(!UnitError::fail("x").poisons_context());
        assert!(UnitError::fatal("x").poisons_context());
        assert!(UnitError::Canceled.poisons_context());
    }

    #[test]
    fn test_acquire_error_from_context_error() {
        let err: AcquireError = ContextError::new("no engine").into();
        assert_eq!(err.as_label(), "acquire_create_failed");
        assert_eq!(err.to_string(), "context creation failed: no engine");
    }

    #[test]
    fn test_output_closed_maps_to_fail() {
        let err: UnitError = OutputClosed.into();
        assert_eq!(err, UnitError::fail("output stream closed"));
    }
}
