//! Soft and hard resets.
//!
//! | Reset | Effect |
//! |-------|--------|
//! | soft  | clear focus, abandon open loops, terminate active threads, stop running predictions |
//! | hard  | delete every row of every kind |
//!
//! Soft reset keeps history (archives, tasks, ideas, emotions, sessions, offloads).
//! Steps run in order and stop at the first failure; earlier steps stay applied.

use serde::Serialize;

use crate::error::StateResult;
use crate::models::{ClosureType, EntityKind};
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SoftResetReport {
    pub focus_cleared: usize,
    pub loops_closed: usize,
    pub threads_terminated: usize,
    pub predictions_stopped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HardResetReport {
    /// Rows deleted per table, in deletion order.
    pub deleted: Vec<(String, usize)>,
}

impl HardResetReport {
    pub fn total(&self) -> usize {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

pub struct ResetController<'a> {
    store: &'a StateStore,
}

impl<'a> ResetController<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    pub fn soft_reset(&self) -> StateResult<SoftResetReport> {
        let report = SoftResetReport {
            focus_cleared: self.store.clear_focus()?,
            loops_closed: self.store.close_all_open_loops(ClosureType::Abandoned)?,
            threads_terminated: self.store.terminate_all_active_threads()?,
            predictions_stopped: self.store.stop_all_running_predictions()?,
        };
        tracing::info!(
            focus_cleared = report.focus_cleared,
            loops_closed = report.loops_closed,
            threads_terminated = report.threads_terminated,
            predictions_stopped = report.predictions_stopped,
            "soft reset complete"
        );
        Ok(report)
    }

    /// Delete everything. Idempotent.
    pub fn hard_reset(&self) -> StateResult<HardResetReport> {
        let mut report = HardResetReport::default();
        for kind in EntityKind::ALL {
            let n = self.store.clear(kind)?;
            report.deleted.push((kind.table().to_string(), n));
        }
        tracing::warn!(total = report.total(), "hard reset complete");
        Ok(report)
    }
}
