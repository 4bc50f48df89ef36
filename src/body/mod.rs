//! Unit bodies: what a unit runs and what it receives.
//!
//! ## Contents
//! - [`Body`], [`BodyRef`], [`BoxBodyFuture`] the executable contract
//! - [`BodyFn`] closure-backed implementation
//! - [`Invocation`] per-unit call input
//! - [`Bindings`] captured variables shared by all units

mod bindings;
#[allow(clippy::module_inception)]
mod body;
mod body_fn;
mod invocation;

pub use bindings::Bindings;
pub use body::{Body, BodyRef, BoxBodyFuture};
pub use body_fn::BodyFn;
pub use invocation::Invocation;
