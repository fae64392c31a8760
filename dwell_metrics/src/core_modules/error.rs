// THEORY:
// The `error` module holds the small error taxonomy of the engine. The metrics
// accumulator is a pure in-memory state machine, so almost every failure here is
// a caller bug (asking about an id that was never seen, handing over a negative
// tracker id) rather than an environmental fault. Each failing operation leaves
// the accumulator untouched.

use crate::core_modules::metrics_manager::ObjectId;
use thiserror::Error;

/// Failures raised by the dwell-time accumulator and its shared handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// A raw tracker id fell outside the accepted (non-negative) domain.
    #[error("invalid object id {0}: ids must be non-negative")]
    InvalidId(i64),
    /// The id has never been accrued, so it has no elapsed time.
    #[error("object {0} has never been tracked")]
    NotFound(ObjectId),
    /// A thread panicked while holding the shared accumulator lock.
    #[error("metrics lock poisoned")]
    Poisoned,
}

/// Failures raised while processing a single frame through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("detector failure: {0}")]
    Detector(String),
    #[error("tracker failure: {0}")]
    Tracker(String),
}
