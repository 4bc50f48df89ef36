//! # Execution contexts and their factory.
//!
//! An [`ExecutionContext`] is the expensive, reusable environment a unit of work runs
//! inside (an interpreter, a sandbox, a session with imported modules, ...). The pool
//! never looks inside one; it only needs to build it, ask it to stop, and close it.
//!
//! A [`ContextFactory`] builds fresh contexts. It carries the environment template
//! (injected variables, functions, imported modules) and is opaque to the runtime.

use std::fmt;

use async_trait::async_trait;

use crate::error::ContextError;

/// Identity of one constructed context, unique within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// # Reusable execution environment.
///
/// Implementations usually wrap a handle with interior mutability; the pool shares
/// the context with the running unit through an `Arc`.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use parapipe::ExecutionContext;
///
/// #[derive(Default)]
/// struct Session {
///     stop: AtomicBool,
/// }
///
/// impl ExecutionContext for Session {
///     fn request_stop(&self) {
///         self.stop.store(true, Ordering::SeqCst);
///     }
///
///     fn close(&self) {}
/// }
/// ```
pub trait ExecutionContext: Send + Sync + 'static {
    /// Asks whatever runs inside this context to stop as soon as it can.
    ///
    /// Called from the cancellation path while a unit is in flight. Must not block.
    fn request_stop(&self);

    /// Releases the resources owned by this context.
    ///
    /// The pool calls this exactly once per constructed context.
    fn close(&self);
}

/// # Builds fresh execution contexts.
///
/// Construction is the costly operation the pool is designed to amortise.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use parapipe::{ContextError, ContextFactory, ExecutionContext};
///
/// struct Session;
///
/// impl ExecutionContext for Session {
///     fn request_stop(&self) {}
///     fn close(&self) {}
/// }
///
/// struct Sessions {
///     modules: Vec<String>,
/// }
///
/// #[async_trait]
/// impl ContextFactory for Sessions {
///     type Context = Session;
///
///     async fn create(&self) -> Result<Session, ContextError> {
///         if self.modules.iter().any(|m| m.is_empty()) {
///             return Err(ContextError::new("empty module name"));
///         }
///         Ok(Session)
///     }
/// }
/// ```
#[async_trait]
pub trait ContextFactory: Send + Sync + 'static {
    /// Context type produced by this factory.
    type Context: ExecutionContext;

    /// Builds and opens one context.
    async fn create(&self) -> Result<Self::Context, ContextError>;
}
