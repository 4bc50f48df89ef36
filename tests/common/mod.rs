//! Shared fixtures for integration tests: a counting context factory.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parapipe::{ContextError, ContextFactory, ExecutionContext, OutputStream};
use tokio_util::sync::CancellationToken;

/// Counters shared by every context a [`MockFactory`] builds.
#[derive(Default)]
pub struct Probe {
    created: AtomicUsize,
    closed: AtomicUsize,
    stop_requests: AtomicUsize,
    double_close: AtomicBool,
    overlaps: AtomicUsize,
    closed_while_running: AtomicUsize,
}

impl Probe {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn no_double_close(&self) -> bool {
        !self.double_close.load(Ordering::SeqCst)
    }

    /// Times a context was entered while another unit was inside it.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Contexts closed while a body was inside them and no stop had been requested.
    pub fn closed_while_running(&self) -> usize {
        self.closed_while_running.load(Ordering::SeqCst)
    }
}

pub struct MockContext {
    serial: usize,
    stop: CancellationToken,
    closed: AtomicBool,
    busy: AtomicBool,
    probe: Arc<Probe>,
}

impl MockContext {
    pub fn serial(&self) -> usize {
        self.serial
    }

    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    pub fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn exit(&self) {
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

pub struct MockFactory {
    probe: Arc<Probe>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl ContextFactory for MockFactory {
    type Context = MockContext;

    async fn create(&self) -> Result<MockContext, ContextError> {
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

/// Drains the stream to the end.
pub async fn collect<T>(mut stream: OutputStream<T>) -> Vec<parapipe::Output<T>> {
    let mut items = Vec::new();
    while let Some(item) = stream.recv().await {
        items.push(item);
    }
    items
}
