// THEORY:
// This file is the main entry point for the `dwell_metrics` library crate.
// It exposes the `OccupancyPipeline` and its data structures (`PipelineConfig`,
// `FrameReport`, `RollupMetrics`) as the high-level interface of the engine, and
// keeps the building blocks (`core_modules`) public for callers that only want
// the dwell-time accumulator on its own.

pub mod core_modules;
pub mod pipeline;

pub use core_modules::error::{MetricsError, PipelineError};
pub use core_modules::metrics_manager::{DwellMetrics, ObjectId, RollupMetrics};
