//! # Orchestrator lifecycle state and run outcome.
//!
//! ```text
//! Idle ──start──► Running ──input exhausted──► Draining ──in-flight empty──► Completed
//!                    │                            ▲  │
//!                    └────────cancel──► Cancelling ◄─┘ (cancel while draining)
//!                                          │
//!                                          └──► Draining
//! ```
//!
//! The current state lives in a `watch` channel so callers can await `Completed`
//! without polling. Illegal transitions are ignored and logged.

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::output::ErrorRecord;

/// Lifecycle of one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    /// Built, not started.
    Idle,
    /// Dispatching input items.
    Running,
    /// No new input is dispatched; waiting for in-flight units.
    Draining,
    /// The cancellation signal was observed; units are being told to stop.
    Cancelling,
    /// Terminal: no unit is running and the output queue is closed.
    Completed,
}

impl OrchestratorState {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Running => "running",
            OrchestratorState::Draining => "draining",
            OrchestratorState::Cancelling => "cancelling",
            OrchestratorState::Completed => "completed",
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition_to(self, to: OrchestratorState) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Running, Draining)
                | (Running, Cancelling)
                | (Draining, Cancelling)
                | (Cancelling, Draining)
                | (Draining, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == OrchestratorState::Completed
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Watch-backed holder of the current [`OrchestratorState`].
pub(crate) struct StateMachine {
    tx: watch::Sender<OrchestratorState>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(OrchestratorState::Idle);
        Self { tx }
    }

    pub(crate) fn current(&self) -> OrchestratorState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.tx.subscribe()
    }

    /// Applies a legal transition. Returns `false` (and changes nothing) otherwise.
    pub(crate) fn transition(&self, to: OrchestratorState) -> bool {
        let mut from = to;
        let applied = self.tx.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(to) {
                *state = to;
                true
            } else {
                false
            }
        });
        if applied {
            info!(from = from.as_label(), to = to.as_label(), "state transition");
        } else if from != to {
            warn!(from = from.as_label(), to = to.as_label(), "illegal state transition ignored");
        }
        applied
    }

    /// Moves straight to `Completed` from any state (control loop panic path).
    pub(crate) fn force_completed(&self) {
        self.tx.send_replace(OrchestratorState::Completed);
    }

    /// Completes once the state is `Completed`.
    pub(crate) async fn completed(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| s.is_terminal()).await;
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Input was exhausted and every dispatched unit finished.
    Completed,
    /// The host requested a stop.
    Cancelled,
    /// The deadline fired. The record is for display only; it is never written to
    /// the output stream.
    TimedOut(ErrorRecord),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RunOutcome::TimedOut(_))
    }
}

/// Final accounting returned by [`Orchestrator::wait`](crate::Orchestrator::wait).
///
/// `dispatched == succeeded + failed + cancelled` always holds. Items that never got a
/// context (scheduling failures) are counted in `scheduling_errors` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub scheduling_errors: usize,
}

impl RunSummary {
    pub(crate) fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            scheduling_errors: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState::*;

    #[test]
    fn test_legal_path() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), Idle);
        assert!(sm.transition(Running));
        assert!(sm.transition(Draining));
        assert!(sm.transition(Completed));
        assert!(sm.current().is_terminal());
    }

    #[test]
    fn test_cancel_path_goes_through_draining() {
        let sm = StateMachine::new();
        sm.transition(Running);
        assert!(sm.transition(Cancelling));
        assert!(!sm.transition(Completed));
        assert!(sm.transition(Draining));
        assert!(sm.transition(Cancelling));
        assert!(sm.transition(Draining));
        assert!(sm.transition(Completed));
    }

    #[test]
    fn test_illegal_transitions_ignored() {
        let sm = StateMachine::new();
        assert!(!sm.transition(Draining));
        assert!(!sm.transition(Completed));
        assert_eq!(sm.current(), Idle);

        sm.force_completed();
        assert!(!sm.transition(Running));
        assert_eq!(sm.current(), Completed);
    }

    #[tokio::test]
    async fn test_completed_wakes_waiters() {
        let sm = std::sync::Arc::new(StateMachine::new());
        let waiter = {
            let sm = sm.clone();
            tokio::spawn(async move { sm.completed().await })
        };
        sm.transition(Running);
        sm.transition(Draining);
        sm.transition(Completed);
        waiter.await.unwrap();
    }
}
