//! # Lease: one context checked out of the pool.
//!
//! A [`Lease`] owns a concurrency permit and a shared handle to the context. It holds
//! only a weak reference back to the pool, so units never keep a disposed pool alive.
//!
//! ## Rules
//! - Exactly one release per lease: explicit via [`Lease::release`], otherwise on drop.
//! - A lease dropped without an explicit release is treated as cancelled: the unit
//!   holding it was torn down mid-flight, so its context is destroyed, never pooled.
//! - The permit is returned **after** the context is back on the idle stack, so the
//!   next waiter finds it there.

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::OwnedSemaphorePermit;

use super::context::{ContextId, ExecutionContext};
use super::pool::PoolShared;

/// A context leased to exactly one unit of work.
pub struct Lease<C: ExecutionContext> {
    id: ContextId,
    context: Arc<C>,
    pool: Weak<PoolShared<C>>,
    permit: Option<OwnedSemaphorePermit>,
    released: bool,
}

impl<C: ExecutionContext> Lease<C> {
    pub(crate) fn new(
        id: ContextId,
        context: Arc<C>,
        pool: Weak<PoolShared<C>>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            id,
            context,
            pool,
            permit: Some(permit),
            released: false,
        }
    }

    /// Identity of the leased context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Shared handle to the leased context.
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Returns the context to the pool.
    ///
    /// With `discard = true` the context is destroyed instead of being reused.
    pub fn release(mut self, discard: bool) {
        self.finish(discard);
    }

    fn finish(&mut self, discard: bool) {
        if self.released {
            return;
        }
        self.released = true;

        let permit = self.permit.take();
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(self.id, Arc::clone(&self.context), discard);
        }
        drop(permit);
    }
}

impl<C: ExecutionContext> Drop for Lease<C> {
    fn drop(&mut self) {
        self.finish(true);
    }
}

impl<C: ExecutionContext> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("context", &self.id)
            .field("released", &self.released)
            .finish()
    }
}
