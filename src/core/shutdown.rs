//! # Stopping an invocation from a process stop request.
//!
//! [`watch_stop`] races a stop source against the invocation's own end:
//!
//! ```text
//! run reaches a terminal state ─► RunEnded        (nothing triggered)
//! signal already triggered     ─► AlreadyStopped  (nothing triggered)
//! stop source fires            ─► Signalled       (signal triggered, reason Requested)
//! stop source fails to install ─► Unavailable     (logged, nothing triggered)
//! ```
//!
//! [`os_stop_signal`] is the production stop source: `SIGINT`, `SIGTERM` or `SIGQUIT`
//! on unix, Ctrl-C elsewhere.

use std::future::Future;
use std::io;

use tokio::sync::watch;
use tracing::{debug, error, info};

use super::signal::{CancellationSignal, StopReason};
use super::state::OrchestratorState;

/// Why the watcher returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchExit {
    Signalled,
    AlreadyStopped,
    RunEnded,
    Unavailable,
}

/// Triggers `signal` when `stop` completes, unless the run ends or stops first.
pub(crate) async fn watch_stop<S>(
    stop: S,
    signal: CancellationSignal,
    mut state: watch::Receiver<OrchestratorState>,
) -> WatchExit
where
    S: Future<Output = io::Result<()>>,
{
    let exit = tokio::select! {
        biased;
        _ = state.wait_for(|s| s.is_terminal()) => WatchExit::RunEnded,
        _ = signal.triggered() => WatchExit::AlreadyStopped,
        res = stop => match res {
            Ok(()) => {
                if signal.trigger(StopReason::Requested) {
                    info!("stop signal received, cancelling");
                }
                WatchExit::Signalled
            }
            Err(e) => {
                error!(reason = %e, "failed to install stop signal handlers");
                WatchExit::Unavailable
            }
        },
    };
    debug!(?exit, "stop watcher finished");
    exit
}

/// Completes on the first of `SIGINT`, `SIGTERM` or `SIGQUIT`.
#[cfg(unix)]
pub(crate) async fn os_stop_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut listeners = [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::quit(),
    ]
    .into_iter()
    .map(signal)
    .collect::<io::Result<Vec<_>>>()?;

    futures::future::select_all(listeners.iter_mut().map(|l| Box::pin(l.recv()))).await;
    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn os_stop_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::state::StateMachine;

    #[tokio::test]
    async fn test_stop_source_triggers_signal() {
        let signal = CancellationSignal::new();
        let states = StateMachine::new();
        let exit = watch_stop(async { Ok(()) }, signal.clone(), states.subscribe()).await;
        assert_eq!(exit, WatchExit::Signalled);
        assert_eq!(signal.reason(), Some(StopReason::Requested));
    }

    #[tokio::test]
    async fn test_failed_install_leaves_signal_untouched() {
        let signal = CancellationSignal::new();
        let states = StateMachine::new();
        let failing = async { Err(io::Error::other("no handlers")) };
        let exit = watch_stop(failing, signal.clone(), states.subscribe()).await;
        assert_eq!(exit, WatchExit::Unavailable);
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn test_exits_when_already_stopped() {
        let signal = CancellationSignal::new();
        signal.trigger(StopReason::Deadline);
        let states = StateMachine::new();
        let exit = watch_stop(std::future::pending(), signal.clone(), states.subscribe()).await;
        assert_eq!(exit, WatchExit::AlreadyStopped);
        assert_eq!(signal.reason(), Some(StopReason::Deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_when_run_ends() {
        let signal = CancellationSignal::new();
        let states = StateMachine::new();
        let watcher = tokio::spawn(watch_stop(
            std::future::pending(),
            signal.clone(),
            states.subscribe(),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!watcher.is_finished());
        states.force_completed();

        assert_eq!(watcher.await.unwrap(), WatchExit::RunEnded);
        assert!(!signal.is_triggered());
    }
}
