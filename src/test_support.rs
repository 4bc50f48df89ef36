//! Counting context factory shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ContextError;
use crate::pool::{ContextFactory, ExecutionContext};

/// Counters observed by tests.
#[derive(Default)]
pub(crate) struct Probe {
    created: AtomicUsize,
    closed: AtomicUsize,
    stop_requests: AtomicUsize,
    double_close: AtomicBool,
    overlaps: AtomicUsize,
    closed_while_running: AtomicUsize,
}

impl Probe {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn no_double_close(&self) -> bool {
        !self.double_close.load(Ordering::SeqCst)
    }

    pub(crate) fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Contexts closed while a body was inside them and no stop had been requested.
    pub(crate) fn closed_while_running(&self) -> usize {
        self.closed_while_running.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockContext {
    serial: usize,
    stop: CancellationToken,
    closed: AtomicBool,
    busy: AtomicBool,
    probe: Arc<Probe>,
}

impl MockContext {
    /// 1-based creation order.
    pub(crate) fn serial(&self) -> usize {
        self.serial
    }

    /// Completes once `request_stop` was called.
    pub(crate) async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    /// Marks the context as in use; records an overlap if it already was.
    pub(crate) fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn exit(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl ExecutionContext for MockContext {
    fn request_stop(&self) {
        self.probe.stop_requests.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.probe.double_close.store(true, Ordering::SeqCst);
            return;
        }
        if self.busy.load(Ordering::SeqCst) && !self.stop.is_cancelled() {
            self.probe.closed_while_running.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct MockFactory {
    probe: Arc<Probe>,
    fail_first: AtomicUsize,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self {
            probe: Arc::new(Probe::default()),
            fail_first: AtomicUsize::new(0),
        }
    }

    /// The first `n` calls to `create` fail.
    pub(crate) fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl ContextFactory for MockFactory {
    type Context = MockContext;

    async fn create(&self) -> Result<MockContext, ContextError> {
        let failing = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ContextError::new("mock factory failure"));
        }
        let serial = self.probe.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockContext {
            serial,
            stop: CancellationToken::new(),
            closed: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            probe: Arc::clone(&self.probe),
        })
    }
}
