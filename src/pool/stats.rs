//! Pool counters and their point-in-time snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of a [`ResourcePool`](crate::ResourcePool).
///
/// - `created` / `destroyed`: contexts built and closed so far
/// - `acquired` / `released`: leases granted and returned so far
/// - `idle`: contexts waiting for reuse
/// - `live`: contexts built and not yet destroyed
/// - `leased`: contexts currently held by units
/// - `peak_leased`: highest `leased` value observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub destroyed: usize,
    pub acquired: usize,
    pub released: usize,
    pub idle: usize,
    pub live: usize,
    pub leased: usize,
    pub peak_leased: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub leased: AtomicUsize,
    pub peak_leased: AtomicUsize,
}

impl Counters {
    pub fn on_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let current = self.leased.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);
    }

    pub fn on_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.leased.fetch_sub(1, Ordering::Relaxed);
    }

    /// Raises the peak counter if `current` exceeds it.
    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_leased.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_leased.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    pub fn snapshot(&self, idle: usize, live: usize) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            idle,
            live,
            leased: self.leased.load(Ordering::Relaxed),
            peak_leased: self.peak_leased.load(Ordering::Relaxed),
        }
    }
}
