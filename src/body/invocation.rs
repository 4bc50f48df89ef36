//! # Invocation: everything one unit body receives.
//!
//! Built fresh for each unit and moved into the body, so no state is shared between
//! calls except what the host put into [`Bindings`] on purpose.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::bindings::Bindings;
use crate::output::{Streams, UnitId};

/// Per-call input of a [`Body`](crate::Body).
///
/// - `unit`: identity of this unit
/// - `input`: the work item
/// - `context`: the leased execution context (exclusive for the duration of the call)
/// - `streams`: typed writers into the shared output queue
/// - `bindings`: captured variables shared by all units of the run
/// - `token`: cancelled when the run is cancelled or times out
pub struct Invocation<C, I, T> {
    pub unit: UnitId,
    pub input: I,
    pub context: Arc<C>,
    pub streams: Streams<T>,
    pub bindings: Arc<Bindings>,
    pub token: CancellationToken,
}

impl<C, I, T> Invocation<C, I, T> {
    /// Shorthand for `self.token.is_cancelled()`.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
