//! # Body: the shared executable applied to every input.
//!
//! The runtime never interprets a body; it hands each one an [`Invocation`] and
//! awaits the returned future. The common handle type is [`BodyRef`], an
//! `Arc<dyn Body<..>>` shared by every unit of a run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::invocation::Invocation;
use crate::error::UnitError;

/// Boxed future returned by [`Body::invoke`].
pub type BoxBodyFuture = Pin<Box<dyn Future<Output = Result<(), UnitError>> + Send + 'static>>;

/// Shared reference to a body.
pub type BodyRef<C, I, T> = Arc<dyn Body<C, I, T>>;

/// # Opaque unit of work.
///
/// Implementations write results through `inv.streams` and should watch `inv.token`
/// (or whatever stop mechanism their context offers) to exit promptly on cancellation.
///
/// Returning:
/// - `Ok(())` finishes the unit normally
/// - `Err(UnitError::Fail)` reports one error event; the context is reused
/// - `Err(UnitError::Fatal)` reports one error event; the context is destroyed
/// - `Err(UnitError::Canceled)` reports nothing; the context is destroyed
///
/// A panic is caught by the runtime and reported like `Fatal`.
pub trait Body<C, I, T>: Send + Sync + 'static {
    /// Returns a stable, human-readable name (for logs).
    fn name(&self) -> &str;

    /// Creates the future for one unit.
    fn invoke(&self, inv: Invocation<C, I, T>) -> BoxBodyFuture;
}
