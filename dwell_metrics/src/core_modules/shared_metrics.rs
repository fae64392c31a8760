// THEORY:
// Once frame capture is decoupled from frame processing, the accumulator may be
// reached from more than one task. `accrue` relies on the delta that
// `start_new_loop` just computed, and the overlay must read a rollup that matches
// the accruals of the same loop. `SharedMetrics` therefore exposes the whole loop
// as one call, performed under a single lock acquisition.

use crate::core_modules::error::MetricsError;
use crate::core_modules::metrics_manager::{DwellMetrics, ObjectId, RollupMetrics};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// The state of the accumulator right after one loop, read under the same lock.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoopSnapshot {
    /// Elapsed seconds of each id accrued in this loop, in accrual order.
    pub visible: Vec<(ObjectId, f64)>,
    pub rollup: RollupMetrics,
}

/// A cloneable, thread-safe handle to a single `DwellMetrics`.
#[derive(Debug, Clone, Default)]
pub struct SharedMetrics {
    inner: Arc<Mutex<DwellMetrics>>,
}

impl SharedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one full loop: new-loop marker, one accrual per id, then the rollup.
    pub fn record_iteration<I>(&self, now: Instant, visible: I) -> Result<LoopSnapshot, MetricsError>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let mut metrics = self.lock()?;
        metrics.start_new_loop(now);
        let mut accrued = Vec::new();
        for id in visible {
            metrics.accrue(id);
            accrued.push(id);
        }

        let visible = accrued
            .into_iter()
            .map(|id| metrics.elapsed_time_for(id).map(|secs| (id, secs)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LoopSnapshot {
            visible,
            rollup: metrics.rollup_metrics(),
        })
    }

    pub fn loop_count(&self) -> Result<u64, MetricsError> {
        Ok(self.lock()?.loop_count())
    }

    pub fn elapsed_time_for(&self, id: ObjectId) -> Result<f64, MetricsError> {
        self.lock()?.elapsed_time_for(id)
    }

    pub fn rollup_metrics(&self) -> Result<RollupMetrics, MetricsError> {
        Ok(self.lock()?.rollup_metrics())
    }

    fn lock(&self) -> Result<MutexGuard<'_, DwellMetrics>, MetricsError> {
        self.inner.lock().map_err(|_| MetricsError::Poisoned)
    }
}
