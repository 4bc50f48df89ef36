//! Output events and the multiplexer that funnels them into one queue.
//!
//! ## Contents
//! - [`OutputEvent`], [`Output`] and the structured records event data model
//! - [`Multiplexer`], [`Streams`] producer side (per-unit typed writers)
//! - [`OutputStream`] consumer side handed to the caller
//!
//! ## Quick reference
//! - **Producers**: every running unit (through its [`Streams`]) and the orchestrator
//!   (scheduling-level error records).
//! - **Consumer**: the caller, through the [`OutputStream`] returned by
//!   [`Orchestrator::start`](crate::Orchestrator::start).

mod event;
mod multiplexer;
mod stream;

pub use event::{
    ErrorCategory, ErrorRecord, InformationRecord, Output, OutputEvent, OutputKind,
    ProgressRecord, UnitId,
};
pub use multiplexer::{Multiplexer, Streams};
pub use stream::OutputStream;
