//! # In-flight registry: the set of running units.
//!
//! Owns the join handles of every dispatched unit and maps task ids back to unit ids,
//! so a unit that died without reporting (aborted, or a panic outside the body) is
//! still accounted for.
//!
//! ## Rules
//! - The registry is owned by the control loop; no lock guards it.
//! - Every spawned unit yields exactly one [`UnitReport`] from `join_next`/`try_join_next`.
//! - A unit aborted by [`Registry::abort_all`] reports `Cancelled`; its lease is released
//!   by drop, which destroys the context.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, warn};

use super::unit::{UnitReport, UnitStatus};
use crate::output::UnitId;

pub(crate) struct Registry {
    set: JoinSet<UnitReport>,
    units: HashMap<task::Id, UnitId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            set: JoinSet::new(),
            units: HashMap::new(),
        }
    }

    /// Starts a unit future on the runtime and tracks it.
    pub(crate) fn spawn<Fut>(&mut self, unit: UnitId, fut: Fut)
    where
        Fut: Future<Output = UnitReport> + Send + 'static,
    {
        let handle = self.set.spawn(fut);
        self.units.insert(handle.id(), unit);
    }

    /// Number of units not yet joined.
    pub(crate) fn len(&self) -> usize {
        self.set.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Waits for any unit to finish. `None` when the registry is empty.
    pub(crate) async fn join_next(&mut self) -> Option<UnitReport> {
        let joined = self.set.join_next_with_id().await?;
        Some(self.settle(joined))
    }

    /// Returns a finished unit without waiting, if there is one.
    pub(crate) fn try_join_next(&mut self) -> Option<UnitReport> {
        let joined = self.set.try_join_next_with_id()?;
        Some(self.settle(joined))
    }

    /// Aborts every unit still running. Their reports arrive through `join_next`.
    pub(crate) fn abort_all(&mut self) {
        if !self.set.is_empty() {
            warn!(in_flight = self.set.len(), "aborting in-flight units");
        }
        self.set.abort_all();
    }

    fn settle(&mut self, joined: Result<(task::Id, UnitReport), JoinError>) -> UnitReport {
        match joined {
            Ok((tid, report)) => {
                self.units.remove(&tid);
                report
            }
            Err(err) => {
                let id = self.units.remove(&err.id()).unwrap_or(UnitId(0));
                let status = if err.is_panic() {
                    error!(unit = %id, "unit task panicked outside its body");
                    UnitStatus::Failed
                } else {
                    UnitStatus::Cancelled
                };
                UnitReport { id, status }
            }
        }
    }
}
