//! # ResourcePool: bounded set of reusable execution contexts.
//!
//! The pool gates access with a counting semaphore sized to the throttle limit and
//! builds contexts lazily, up to that limit, the first time they are needed.
//!
//! ## Architecture
//! ```text
//! acquire(token)
//!   ├─► token cancelled?                 ─► Err(Cancelled)
//!   ├─► semaphore.acquire_owned()        (suspends; cancellable)
//!   │     └─ closed (disposed)           ─► Err(Closed)
//!   ├─► idle.pop()                        ─► Lease (reuse)
//!   └─► factory.create()                  ─► register in `live` ─► Lease (fresh)
//!
//! Lease::release(discard) / Drop
//!   ├─► discard || always_fresh || disposed ─► destroy (close once, live -= 1)
//!   ├─► otherwise                           ─► idle.push()
//!   └─► permit dropped (after the push)
//!
//! dispose()
//!   ├─► semaphore.close()  (wakes blocked acquirers with Closed)
//!   └─► drain `live`, close every context once (idle or still leased)
//! ```
//!
//! ## Rules
//! - `live` holds every context built and not yet destroyed; removing an entry is
//!   the only way to destroy one, so no context is ever closed twice.
//! - The number of leased contexts never exceeds the throttle limit (one permit each).
//! - Under the always-fresh policy a destroyed context is not rebuilt in the release
//!   path; the freed slot is filled by the next `acquire`. `release` never suspends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::context::{ContextFactory, ContextId, ExecutionContext};
use super::lease::Lease;
use super::stats::{Counters, PoolStats};
use crate::core::PoolConfig;
use crate::error::{AcquireError, RuntimeError};

/// Locks a std mutex, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the pool and the leases it hands out.
pub(crate) struct PoolShared<C: ExecutionContext> {
    always_fresh: bool,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<(ContextId, Arc<C>)>>,
    live: Mutex<HashMap<ContextId, Arc<C>>>,
    disposed: AtomicBool,
    counters: Counters,
}

impl<C: ExecutionContext> PoolShared<C> {
    /// Takes back a context from a finished lease.
    pub(crate) fn recycle(&self, id: ContextId, context: Arc<C>, discard: bool) {
        if discard || self.always_fresh {
            self.destroy(id);
        } else {
            let mut idle = lock(&self.idle);
            if self.disposed.load(Ordering::Acquire) {
                drop(idle);
                self.destroy(id);
            } else {
                trace!(context = %id, "context returned to idle set");
                idle.push((id, context));
            }
        }
        self.counters.on_released();
    }

    /// Closes the context if it is still registered. Idempotent per id.
    fn destroy(&self, id: ContextId) {
        let removed = lock(&self.live).remove(&id);
        if let Some(context) = removed {
            context.close();
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
            debug!(context = %id, "context destroyed");
        }
    }
}

/// Bounded pool of execution contexts built by a [`ContextFactory`].
///
/// ### Responsibilities
/// - **Admission**: one semaphore permit per lease, `throttle_limit` permits in total
/// - **Lazy construction**: contexts are built on demand, never more than the limit
/// - **Reuse policy**: idle stack (LIFO) unless always-fresh or the lease was cancelled
/// - **Teardown**: [`dispose`](Self::dispose) closes every remaining context exactly once
pub struct ResourcePool<F: ContextFactory> {
    factory: F,
    max: usize,
    next_id: AtomicU64,
    shared: Arc<PoolShared<F::Context>>,
}

impl<F: ContextFactory> ResourcePool<F> {
    /// Creates an empty pool; no context is built until the first [`acquire`](Self::acquire).
    ///
    /// Fails fast with [`RuntimeError::InvalidThrottleLimit`] on a zero limit.
    pub fn new(factory: F, cfg: &PoolConfig) -> Result<Self, RuntimeError> {
        cfg.validate()?;
        let max = cfg.throttle_limit;
        Ok(Self {
            factory,
            max,
            next_id: AtomicU64::new(1),
            shared: Arc::new(PoolShared {
                always_fresh: cfg.always_fresh,
                semaphore: Arc::new(Semaphore::new(max)),
                idle: Mutex::new(Vec::with_capacity(max)),
                live: Mutex::new(HashMap::with_capacity(max)),
                disposed: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        })
    }

    /// Leases a context, suspending while all `throttle_limit` contexts are in use.
    ///
    /// ### Cancellation semantics
    /// - An already-cancelled `token` fails immediately, even if a context is idle.
    /// - Cancellation while waiting for a permit or while a context is being built
    ///   fails with [`AcquireError::Cancelled`]; a half-built context is never registered.
    pub async fn acquire(&self, token: &CancellationToken) -> Result<Lease<F::Context>, AcquireError> {
        if token.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(AcquireError::Cancelled),
            res = self.acquire_inner() => res,
        }
    }

    async fn acquire_inner(&self) -> Result<Lease<F::Context>, AcquireError> {
        let permit = Arc::clone(&self.shared.semaphore)
            .acquire_owned()
            .await
            .map_err(|_closed| AcquireError::Closed)?;

        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(AcquireError::Closed);
        }

        let reused = lock(&self.shared.idle).pop();
        let (id, context) = match reused {
            Some((id, context)) => {
                debug!(context = %id, "reusing idle context");
                (id, context)
            }
            None => self.create().await?,
        };

        self.shared.counters.on_acquired();
        Ok(Lease::new(id, context, Arc::downgrade(&self.shared), permit))
    }

    /// Builds one context and registers it in the live set.
    async fn create(&self) -> Result<(ContextId, Arc<F::Context>), AcquireError> {
        let context = Arc::new(self.factory.create().await?);
        let id = ContextId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut live = lock(&self.shared.live);
        if self.shared.disposed.load(Ordering::Acquire) {
            drop(live);
            context.close();
            return Err(AcquireError::Closed);
        }
        live.insert(id, Arc::clone(&context));
        drop(live);

        self.shared.counters.created.fetch_add(1, Ordering::Relaxed);
        debug!(context = %id, "context created");
        Ok((id, context))
    }

    /// Returns a lease. Equivalent to [`Lease::release`].
    ///
    /// `cancelled = true` destroys the context instead of pooling it.
    pub fn release(&self, lease: Lease<F::Context>, cancelled: bool) {
        lease.release(cancelled);
    }

    /// Closes the pool: wakes blocked acquirers with [`AcquireError::Closed`] and closes
    /// every context built so far, idle or still leased. Safe to call more than once.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.semaphore.close();

        lock(&self.shared.idle).clear();
        let drained: Vec<(ContextId, Arc<F::Context>)> = lock(&self.shared.live).drain().collect();
        for (id, context) in drained {
            context.close();
            self.shared.counters.destroyed.fetch_add(1, Ordering::Relaxed);
            debug!(context = %id, "context destroyed on dispose");
        }
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Configured maximum number of contexts.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of idle contexts ready for reuse.
    pub fn idle(&self) -> usize {
        lock(&self.shared.idle).len()
    }

    /// Returns a snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        let idle = lock(&self.shared.idle).len();
        let live = lock(&self.shared.live).len();
        self.shared.counters.snapshot(idle, live)
    }
}

impl<F: ContextFactory> Drop for ResourcePool<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
