//! # OutputStream: the caller's end of the shared output queue.
//!
//! Three ways to consume:
//! - async: [`OutputStream::recv`] or the [`futures::Stream`] impl
//! - polling: [`OutputStream::try_next`] never waits (drain between enqueues)
//! - blocking: [`OutputStream::blocking_iter`] for synchronous hosts
//!
//! The stream ends (`None`) once the orchestrator has drained every unit and closed
//! the queue.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::event::Output;
use crate::error::OutputClosed;

enum Receiver<T> {
    Bounded(mpsc::Receiver<Output<T>>),
    Unbounded(mpsc::UnboundedReceiver<Output<T>>),
}

/// Consuming end of the output queue. Single consumer.
pub struct OutputStream<T> {
    rx: Receiver<T>,
}

impl<T> OutputStream<T> {
    pub(crate) fn bounded(rx: mpsc::Receiver<Output<T>>) -> Self {
        Self {
            rx: Receiver::Bounded(rx),
        }
    }

    pub(crate) fn unbounded(rx: mpsc::UnboundedReceiver<Output<T>>) -> Self {
        Self {
            rx: Receiver::Unbounded(rx),
        }
    }

    /// Waits for the next item; `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<Output<T>> {
        match &mut self.rx {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Takes a buffered item without waiting.
    ///
    /// - `Ok(Some(item))`: an item was buffered
    /// - `Ok(None)`: nothing buffered right now
    /// - `Err(OutputClosed)`: the queue is closed and fully drained
    pub fn try_next(&mut self) -> Result<Option<Output<T>>, OutputClosed> {
        let res = match &mut self.rx {
            Receiver::Bounded(rx) => rx.try_recv(),
            Receiver::Unbounded(rx) => rx.try_recv(),
        };
        match res {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(OutputClosed),
        }
    }

    /// Consumes the stream as a blocking iterator.
    ///
    /// # Panics
    /// Each step blocks the current thread; calling it from within an async
    /// execution context panics (tokio's `blocking_recv` contract).
    pub fn blocking_iter(mut self) -> impl Iterator<Item = Output<T>> {
        std::iter::from_fn(move || match &mut self.rx {
            Receiver::Bounded(rx) => rx.blocking_recv(),
            Receiver::Unbounded(rx) => rx.blocking_recv(),
        })
    }
}

impl<T> Stream for OutputStream<T> {
    type Item = Output<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().rx {
            Receiver::Bounded(rx) => rx.poll_recv(cx),
            Receiver::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}
