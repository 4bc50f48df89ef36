//! # Function-backed body (`BodyFn`)
//!
//! [`BodyFn`] wraps a closure `F: Fn(Invocation<C, I, T>) -> Fut`, producing a fresh
//! future per unit. Nothing is shared between units unless the closure captures an
//! `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use parapipe::{BodyFn, BodyRef, ExecutionContext, Invocation, UnitError};
//!
//! struct Session;
//! impl ExecutionContext for Session {
//!     fn request_stop(&self) {}
//!     fn close(&self) {}
//! }
//!
//! let double: BodyRef<Session, u64, u64> =
//!     BodyFn::arc("double", |inv: Invocation<Session, u64, u64>| async move {
//!         inv.streams.success(inv.input * 2).await?;
//!         Ok::<_, UnitError>(())
//!     });
//! assert_eq!(double.name(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::body::{Body, BoxBodyFuture};
use super::invocation::Invocation;
use crate::error::UnitError;

/// Function-backed body implementation.
pub struct BodyFn<F, C, I, T> {
    name: Cow<'static, str>,
    f: F,
    _marker: PhantomData<fn(C, I) -> T>,
}

impl<F, C, I, T> BodyFn<F, C, I, T> {
    /// Creates a new function-backed body.
    ///
    /// Prefer [`BodyFn::arc`] when you immediately need a [`BodyRef`](crate::BodyRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _marker: PhantomData,
        }
    }

    /// Creates the body and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, C, I, T> Body<C, I, T> for BodyFn<F, C, I, T>
where
    F: Fn(Invocation<C, I, T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    C: 'static,
    I: 'static,
    T: 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, inv: Invocation<C, I, T>) -> BoxBodyFuture {
        Box::pin((self.f)(inv))
    }
}
