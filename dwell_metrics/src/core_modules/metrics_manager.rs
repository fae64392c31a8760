// THEORY:
// The `metrics_manager` is the stateful heart of the occupancy engine. The tracker
// tells us *who* is on screen in each frame; this module turns that stream of ids
// into *how long* each of them has been seen, and rolls the per-object times up
// into the handful of numbers the overlay displays.
//
// Key architectural principles:
// 1.  **Loop-Scoped Increment**: Time is not measured per object. At the start of
//     each processing loop the manager computes one wall-clock delta (time since
//     the previous loop started) and every object reported visible during that loop
//     is credited with exactly that delta. The very first loop has no predecessor,
//     so its delta is zero.
// 2.  **Implicit Registration**: An id is registered the first time it is accrued.
//     There is no separate "register" step and no deletion: once seen, an object is
//     part of the rollup for the rest of the run, even after the tracker forgets it.
// 3.  **Permanent Keys**: If the tracker later hands the same id to a different
//     physical person, the old record simply keeps growing. Whether that is correct
//     depends on the tracker's id-reuse policy, which this module does not control.
// 4.  **Pure Queries**: `elapsed_time_for` and `rollup_metrics` never mutate, so the
//     overlay may call them as often as it likes within a loop.

use crate::core_modules::error::MetricsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// A tracker-assigned object identifier. Always non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The 1-based number shown to humans (tracker ids start at zero).
    pub const fn display_number(self) -> u64 {
        self.0 + 1
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<u32> for ObjectId {
    fn from(raw: u32) -> Self {
        Self(raw as u64)
    }
}

impl From<usize> for ObjectId {
    fn from(raw: usize) -> Self {
        Self(raw as u64)
    }
}

impl TryFrom<i64> for ObjectId {
    type Error = MetricsError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| MetricsError::InvalidId(raw))
    }
}

impl TryFrom<i32> for ObjectId {
    type Error = MetricsError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::try_from(raw as i64)
    }
}

/// The accumulated visible time of a single tracked object.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObjectRecord {
    id: ObjectId,
    elapsed: Duration,
}

impl TrackedObjectRecord {
    fn new(id: ObjectId) -> Self {
        Self {
            id,
            elapsed: Duration::ZERO,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Summary statistics over every object seen so far. All times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RollupMetrics {
    /// Number of distinct ids ever registered.
    pub count: usize,
    pub total: f64,
    /// `total / count`, or zero when nothing has been seen.
    pub average: f64,
    /// The longest individual time, or zero when nothing has been seen.
    pub max: f64,
}

/// Accumulates per-object dwell time across processing loops.
#[derive(Debug, Default)]
pub struct DwellMetrics {
    /// Every object ever accrued. Never pruned.
    records: HashMap<ObjectId, TrackedObjectRecord>,
    /// The increment credited to each object accrued during the current loop.
    loop_delta: Duration,
    /// When the previous loop started. `None` until the first loop.
    previous_loop_start: Option<Instant>,
    loop_count: u64,
}

impl DwellMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a processing loop at `now`.
    ///
    /// Computes the delta since the previous loop start (zero on the first call)
    /// and remembers it as the increment for every `accrue` in this loop. An
    /// instant earlier than the previous one yields a zero delta, so recorded
    /// times never decrease.
    pub fn start_new_loop(&mut self, now: Instant) {
        self.loop_delta = match self.previous_loop_start {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.previous_loop_start = Some(now);
        self.loop_count += 1;
    }

    /// Credits `id` with the current loop's delta, registering it on first sight.
    ///
    /// Callers must accrue each visible id once per loop: a second call in the
    /// same loop adds the delta again.
    pub fn accrue(&mut self, id: ObjectId) {
        let delta = self.loop_delta;
        let record = self.records.entry(id).or_insert_with(|| {
            debug!(object_id = %id, "registering new tracked object");
            TrackedObjectRecord::new(id)
        });
        record.elapsed += delta;
    }

    /// Total seconds `id` has been accrued.
    pub fn elapsed_time_for(&self, id: ObjectId) -> Result<f64, MetricsError> {
        self.records
            .get(&id)
            .map(TrackedObjectRecord::elapsed_seconds)
            .ok_or(MetricsError::NotFound(id))
    }

    pub fn rollup_metrics(&self) -> RollupMetrics {
        let count = self.records.len();
        if count == 0 {
            return RollupMetrics::default();
        }

        let total: Duration = self.records.values().map(|r| r.elapsed).sum();
        let max = self
            .records
            .values()
            .map(|r| r.elapsed)
            .max()
            .unwrap_or_default();
        let total = total.as_secs_f64();

        RollupMetrics {
            count,
            total,
            average: total / count as f64,
            max: max.as_secs_f64(),
        }
    }

    pub fn is_tracking(&self, id: ObjectId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &TrackedObjectRecord> {
        self.records.values()
    }

    pub fn current_loop_delta(&self) -> Duration {
        self.loop_delta
    }

    /// How many times `start_new_loop` has been called.
    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A hand-cranked monotonic clock for deterministic loop timing.
    struct Clock {
        now: Instant,
    }

    impl Clock {
        fn new() -> Self {
            Self { now: Instant::now() }
        }

        fn at(&self, secs: f64) -> Instant {
            self.now + Duration::from_secs_f64(secs)
        }
    }

    fn id(raw: u64) -> ObjectId {
        ObjectId::new(raw)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_rollup_is_all_zero() {
        let metrics = DwellMetrics::new();
        assert_eq!(
            metrics.rollup_metrics(),
            RollupMetrics {
                count: 0,
                total: 0.0,
                average: 0.0,
                max: 0.0
            }
        );
    }

    #[test]
    fn first_loop_accrues_nothing() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(0.0));
        metrics.accrue(id(5));

        assert_eq!(metrics.elapsed_time_for(id(5)), Ok(0.0));
        assert_eq!(metrics.rollup_metrics().count, 1);
    }

    #[test]
    fn accrue_before_any_loop_registers_with_zero_time() {
        let mut metrics = DwellMetrics::new();
        metrics.accrue(id(3));

        assert!(metrics.is_tracking(id(3)));
        assert_eq!(metrics.elapsed_time_for(id(3)), Ok(0.0));
        assert_eq!(metrics.loop_count(), 0);
    }

    #[test]
    fn every_visible_object_gets_the_same_increment() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(10.0));
        metrics.start_new_loop(clock.at(10.25));
        metrics.accrue(id(1));
        metrics.accrue(id(2));

        assert_eq!(metrics.current_loop_delta(), Duration::from_millis(250));
        assert_close(metrics.elapsed_time_for(id(1)).unwrap(), 0.25);
        assert_close(metrics.elapsed_time_for(id(2)).unwrap(), 0.25);
    }

    #[test]
    fn two_loop_scenario() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(0.0));
        metrics.accrue(id(0));
        metrics.start_new_loop(clock.at(1.5));
        metrics.accrue(id(0));
        metrics.accrue(id(1));

        assert_close(metrics.elapsed_time_for(id(0)).unwrap(), 1.5);
        assert_close(metrics.elapsed_time_for(id(1)).unwrap(), 1.5);

        let rollup = metrics.rollup_metrics();
        assert_eq!(rollup.count, 2);
        assert_close(rollup.total, 3.0);
        assert_close(rollup.average, 1.5);
        assert_close(rollup.max, 1.5);
    }

    #[test]
    fn average_and_max_over_uneven_times() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        let mut t = 0.0;
        for (raw, secs) in [(1, 2.0), (2, 5.0), (3, 1.0)] {
            metrics.start_new_loop(clock.at(t));
            t += secs;
            metrics.start_new_loop(clock.at(t));
            metrics.accrue(id(raw));
        }

        let rollup = metrics.rollup_metrics();
        assert_eq!(rollup.count, 3);
        assert_close(rollup.total, 8.0);
        assert!((rollup.average - 2.667).abs() < 1e-3);
        assert_close(rollup.max, 5.0);
    }

    #[test]
    fn times_and_count_never_decrease() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        let visible_per_loop: [&[u64]; 6] = [&[0, 1], &[0], &[2], &[], &[0, 2], &[1]];

        let mut previous: HashMap<ObjectId, f64> = HashMap::new();
        let mut previous_count = 0;
        for (i, visible) in visible_per_loop.iter().enumerate() {
            metrics.start_new_loop(clock.at(i as f64 * 0.5));
            for raw in *visible {
                metrics.accrue(id(*raw));
            }

            for record in metrics.records() {
                let before = previous.get(&record.id()).copied().unwrap_or(0.0);
                assert!(record.elapsed_seconds() >= before);
                previous.insert(record.id(), record.elapsed_seconds());
            }
            let count = metrics.rollup_metrics().count;
            assert!(count >= previous_count);
            previous_count = count;
        }
        assert_eq!(previous_count, 3);
        assert_eq!(metrics.loop_count(), 6);
    }

    #[test]
    fn returning_object_resumes_from_stored_time() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(0.0));
        metrics.start_new_loop(clock.at(1.0));
        metrics.accrue(id(7));
        assert_close(metrics.elapsed_time_for(id(7)).unwrap(), 1.0);

        // Absent for a few loops.
        metrics.start_new_loop(clock.at(2.0));
        metrics.start_new_loop(clock.at(3.0));
        metrics.start_new_loop(clock.at(4.0));
        assert_close(metrics.elapsed_time_for(id(7)).unwrap(), 1.0);

        metrics.start_new_loop(clock.at(4.5));
        metrics.accrue(id(7));
        assert_close(metrics.elapsed_time_for(id(7)).unwrap(), 1.5);
    }

    #[test]
    fn double_accrual_in_one_loop_counts_twice() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(0.0));
        metrics.start_new_loop(clock.at(2.0));
        metrics.accrue(id(4));
        metrics.accrue(id(4));

        assert_close(metrics.elapsed_time_for(id(4)).unwrap(), 4.0);
        assert_eq!(metrics.rollup_metrics().count, 1);
    }

    #[test]
    fn earlier_instant_yields_zero_delta() {
        let clock = Clock::new();
        let mut metrics = DwellMetrics::new();
        metrics.start_new_loop(clock.at(5.0));
        metrics.start_new_loop(clock.at(4.0));
        metrics.accrue(id(1));

        assert_eq!(metrics.current_loop_delta(), Duration::ZERO);
        assert_eq!(metrics.elapsed_time_for(id(1)), Ok(0.0));
    }

    #[test]
    fn unknown_id_is_not_found_and_does_not_register() {
        let metrics = DwellMetrics::new();
        assert_eq!(
            metrics.elapsed_time_for(id(9)),
            Err(MetricsError::NotFound(id(9)))
        );
        assert!(!metrics.is_tracking(id(9)));
        assert_eq!(metrics.rollup_metrics().count, 0);
    }

    #[test]
    fn negative_raw_ids_are_rejected() {
        assert_eq!(ObjectId::try_from(-1i64), Err(MetricsError::InvalidId(-1)));
        assert_eq!(ObjectId::try_from(-7i32), Err(MetricsError::InvalidId(-7)));
        assert_eq!(ObjectId::try_from(12i64), Ok(id(12)));
        assert_eq!(id(0).display_number(), 1);
    }

    #[test]
    fn rollup_serializes_with_plain_field_names() {
        let rollup = RollupMetrics {
            count: 2,
            total: 3.0,
            average: 1.5,
            max: 1.5,
        };
        let json = serde_json::to_value(rollup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "count": 2, "total": 3.0, "average": 1.5, "max": 1.5 })
        );
    }
}
