//! # Multiplexer: typed sub-channels funnelled into one queue.
//!
//! [`Multiplexer`] is a thin, cloneable wrapper around the producer side of the shared
//! output queue. Each unit writes through its own [`Streams`] handle, which stamps the
//! unit id and the channel tag on every event.
//!
//! ## Architecture
//! ```text
//! Producers (many):                          Consumer (one):
//!   Streams(unit-1).success(v) ──┐
//!   Streams(unit-2).warning(m) ──┼──► shared queue ───► OutputStream (caller)
//!   Streams(unit-N).error(r)   ──┤   (bounded or
//!   Orchestrator (scheduling)  ──┘    unbounded mpsc)
//! ```
//!
//! ## Rules
//! - **No extra lock**: the queue itself is the only serialization point.
//! - **Push-as-produced**: every write is forwarded immediately, never buffered per unit.
//! - **Backpressure**: with a bounded queue a write waits for room; unbounded writes
//!   never wait.
//! - **Closure**: the queue closes once every `Multiplexer`/`Streams` clone is dropped.

use tokio::sync::mpsc;

use super::event::{ErrorRecord, InformationRecord, Output, OutputEvent, ProgressRecord, UnitId};
use super::stream::OutputStream;
use crate::error::OutputClosed;

enum Sender<T> {
    Bounded(mpsc::Sender<Output<T>>),
    Unbounded(mpsc::UnboundedSender<Output<T>>),
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        match self {
            Sender::Bounded(tx) => Sender::Bounded(tx.clone()),
            Sender::Unbounded(tx) => Sender::Unbounded(tx.clone()),
        }
    }
}

/// Producer side of the shared output queue.
pub struct Multiplexer<T> {
    tx: Sender<T>,
}

impl<T> Clone for Multiplexer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Multiplexer<T> {
    /// Creates a queue and returns both ends.
    ///
    /// `bound = None` builds an unbounded queue; `Some(n)` a queue holding at most `n`
    /// (min 1) undelivered items.
    pub fn channel(bound: Option<usize>) -> (Self, OutputStream<T>) {
        match bound {
            Some(cap) => {
                let (tx, rx) = mpsc::channel(cap.max(1));
                (
                    Self {
                        tx: Sender::Bounded(tx),
                    },
                    OutputStream::bounded(rx),
                )
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (
                    Self {
                        tx: Sender::Unbounded(tx),
                    },
                    OutputStream::unbounded(rx),
                )
            }
        }
    }

    /// Appends one tagged event to the shared queue.
    pub async fn emit(&self, unit: Option<UnitId>, event: OutputEvent<T>) -> Result<(), OutputClosed> {
        let item = Output { unit, event };
        match &self.tx {
            Sender::Bounded(tx) => tx.send(item).await.map_err(|_| OutputClosed),
            Sender::Unbounded(tx) => tx.send(item).map_err(|_| OutputClosed),
        }
    }

    /// Returns the per-unit writer handle.
    pub fn streams(&self, unit: UnitId) -> Streams<T> {
        Streams {
            unit: Some(unit),
            mux: self.clone(),
        }
    }

    /// Returns a writer for events that belong to no unit (scheduling-level).
    pub(crate) fn scheduler_streams(&self) -> Streams<T> {
        Streams {
            unit: None,
            mux: self.clone(),
        }
    }
}

/// Per-unit writer with one method per output channel.
///
/// Cheap to clone; every clone keeps the output queue open.
///
/// # Example
/// ```rust
/// # async fn demo(streams: parapipe::Streams<u32>) -> Result<(), parapipe::OutputClosed> {
/// streams.verbose("starting").await?;
/// streams.success(42).await?;
/// # Ok(())
/// # }
/// ```
pub struct Streams<T> {
    unit: Option<UnitId>,
    mux: Multiplexer<T>,
}

impl<T> Clone for Streams<T> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit,
            mux: self.mux.clone(),
        }
    }
}

impl<T: Send + 'static> Streams<T> {
    /// Unit these streams write for (`None` for scheduler-owned streams).
    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    /// Writes any event.
    pub async fn emit(&self, event: OutputEvent<T>) -> Result<(), OutputClosed> {
        self.mux.emit(self.unit, event).await
    }

    /// Writes a result value.
    pub async fn success(&self, value: T) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Success(value)).await
    }

    /// Writes a non-terminating error record.
    pub async fn error(&self, record: ErrorRecord) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Error(record)).await
    }

    pub async fn debug(&self, message: impl Into<String>) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Debug(message.into())).await
    }

    pub async fn information(&self, record: InformationRecord) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Information(record)).await
    }

    pub async fn progress(&self, record: ProgressRecord) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Progress(record)).await
    }

    pub async fn verbose(&self, message: impl Into<String>) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Verbose(message.into())).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> Result<(), OutputClosed> {
        self.emit(OutputEvent::Warning(message.into())).await
    }
}
