//! # Per-invocation cancellation signal.
//!
//! [`CancellationSignal`] wraps a [`CancellationToken`] and remembers **why** it fired.
//! Two sources can trigger it: an explicit stop request and the invocation deadline.
//! The first trigger wins; later triggers are no-ops and never change the reason.
//!
//! ```text
//! Orchestrator::cancel() ──► trigger(Requested) ─┐
//! deadline watchdog      ──► trigger(Deadline)  ─┼─► reason.set (first wins) ─► token.cancel()
//! OS stop signal         ──► trigger(Requested) ─┘                                  │
//!                                                        child tokens (one per unit) ◄┘
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Why the signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The host asked to stop (`cancel`, `abort`, OS stop signal, drop).
    Requested,
    /// The configured deadline elapsed.
    Deadline,
}

impl StopReason {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            StopReason::Requested => "stop_requested",
            StopReason::Deadline => "deadline_reached",
        }
    }
}

/// One-shot, permanent cancellation trigger shared by everything in one invocation.
///
/// Cheap to clone; clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `true` if this call was the first trigger.
    pub fn trigger(&self, reason: StopReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason recorded by the first trigger, if any.
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Completes once the signal has fired.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// The underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A token cancelled together with this signal, but cancellable on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Spawns a watchdog that fires the signal with [`StopReason::Deadline`] after `after`.
    ///
    /// The watchdog exits early if the signal fires for another reason.
    pub(crate) fn arm_deadline(&self, after: Duration) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal.triggered() => {}
                _ = tokio::time::sleep(after) => {
                    if signal.trigger(StopReason::Deadline) {
                        info!(timeout = ?after, reason = StopReason::Deadline.as_label(), "deadline reached");
                    }
                }
            }
        })
    }
}
