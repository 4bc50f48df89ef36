//! # Orchestrator builder.
//!
//! Collects the optional parts of an invocation (captured variables) and validates
//! the configuration before anything is allocated.

use std::any::Any;

use super::config::PoolConfig;
use super::orchestrator::Orchestrator;
use crate::body::{Bindings, BodyRef};
use crate::error::RuntimeError;
use crate::pool::{ContextFactory, ResourcePool};

/// Builder for constructing an [`Orchestrator`] with optional features.
pub struct OrchestratorBuilder {
    cfg: PoolConfig,
    bindings: Bindings,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            bindings: Bindings::default(),
        }
    }

    /// Replaces the captured variables visible to every unit.
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Adds one captured variable.
    pub fn bind<V: Any + Send + Sync>(mut self, name: impl Into<String>, value: V) -> Self {
        self.bindings.insert(name, value);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Fails fast with [`RuntimeError::InvalidThrottleLimit`] before any context is
    /// built. The pool stays empty until the first unit is dispatched.
    pub fn build<F, I, T>(
        self,
        factory: F,
        body: BodyRef<F::Context, I, T>,
    ) -> Result<Orchestrator<F, I, T>, RuntimeError>
    where
        F: ContextFactory,
        I: Send + 'static,
        T: Send + 'static,
    {
        let pool = ResourcePool::new(factory, &self.cfg)?;
        Ok(Orchestrator::new_internal(self.cfg, pool, body, self.bindings))
    }
}
