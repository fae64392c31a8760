// THEORY:
// The `pipeline` module is the top-level API of the occupancy engine. It wires an
// object detector, a tracker and the dwell-time accumulator into a single
// per-frame call, and turns the result into the text and labels an overlay draws.
//
// One call to `process_frame` is one loop of the original control flow:
//   Stage 1: detect objects at the configured confidence.
//   Stage 2: drop every prediction that is not one of the configured labels.
//   Stage 3: hand the survivors to the tracker and receive stable ids.
//   Stage 4: start a new metrics loop at the frame timestamp and accrue every
//            tracked id, all under one lock.
//   Stage 5: relabel each tracked prediction with its dwell time and build the
//            overlay text with the rollup metrics.

use crate::core_modules::detection::{filter_predictions_by_label, ObjectDetector, Prediction};
use crate::core_modules::error::PipelineError;
use crate::core_modules::tracker::{CentroidTracker, ObjectTracker};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

// Re-export key data structures for the public API.
pub use crate::core_modules::metrics_manager::{ObjectId, RollupMetrics};
pub use crate::core_modules::shared_metrics::{LoopSnapshot, SharedMetrics};

/// Configuration for the OccupancyPipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum detector confidence for a prediction to be considered at all.
    pub confidence_threshold: f32,
    /// Class labels that count as subjects. Everything else is ignored.
    pub labels: Vec<String>,
    /// Frames a tracked object may go undetected before it is dropped.
    pub deregister_frames: u32,
    /// Largest centroid jump, in pixels, still treated as the same object.
    pub max_distance: f64,
    /// Noun used on the overlay ("Person 3 | 1.20 sec").
    pub subject_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            labels: vec!["person".to_string()],
            deregister_frames: 20,
            max_distance: 50.0,
            subject_name: "Person".to_string(),
        }
    }
}

/// The output of the pipeline for a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Tracked predictions, labels rewritten to "<subject> <n> | <secs> sec".
    pub predictions: Vec<Prediction>,
    /// Overlay text lines, top to bottom.
    pub text: Vec<String>,
    pub metrics: RollupMetrics,
    pub inference_duration: Duration,
}

/// The main, top-level struct for the occupancy engine.
pub struct OccupancyPipeline<D, T> {
    detector: D,
    tracker: T,
    metrics: SharedMetrics,
    config: PipelineConfig,
}

impl<D: ObjectDetector> OccupancyPipeline<D, CentroidTracker> {
    /// Builds a pipeline whose tracker is configured from `config`.
    pub fn with_centroid_tracker(detector: D, config: PipelineConfig) -> Self {
        let tracker = CentroidTracker::new(config.deregister_frames, config.max_distance);
        Self::new(detector, tracker, config)
    }
}

impl<D: ObjectDetector, T: ObjectTracker> OccupancyPipeline<D, T> {
    pub fn new(detector: D, tracker: T, config: PipelineConfig) -> Self {
        Self {
            detector,
            tracker,
            metrics: SharedMetrics::new(),
            config,
        }
    }

    /// Processes one frame captured at `now`.
    pub fn process_frame(&mut self, now: Instant, frame: &D::Frame) -> Result<FrameReport, PipelineError> {
        // Stage 1 & 2: Detection and label filtering
        let results = self
            .detector
            .detect_objects(frame, self.config.confidence_threshold)?;
        let inference_duration = results.duration;
        let subjects = filter_predictions_by_label(results.predictions, &self.config.labels);

        // Stage 3: Tracking
        let tracked = self.tracker.update(subjects);

        // Stage 4: Dwell-time accounting
        let snapshot = self.metrics.record_iteration(now, tracked.keys().copied())?;

        // Stage 5: Labels and overlay text
        let mut text = vec![
            format!("Model: {}", self.detector.model_id()),
            format!("Inference time: {:1.3} s", inference_duration.as_secs_f64()),
            format!("{} currently detected:", self.plural_subject()),
        ];
        if tracked.is_empty() {
            text.push("-- NONE".to_string());
        }

        let mut predictions = Vec::with_capacity(tracked.len());
        for ((id, secs), (_, mut prediction)) in snapshot.visible.iter().zip(tracked) {
            let label = format!(
                "{} {} | {:.2} sec",
                self.config.subject_name,
                id.display_number(),
                secs
            );
            prediction.label = label.clone();
            text.push(label);
            predictions.push(prediction);
        }

        let metrics = snapshot.rollup;
        text.push(String::new());
        text.extend(metrics_lines(&self.plural_subject().to_lowercase(), &metrics));

        debug!(
            visible = predictions.len(),
            seen = metrics.count,
            total_secs = metrics.total,
            "frame processed"
        );

        Ok(FrameReport {
            predictions,
            text,
            metrics,
            inference_duration,
        })
    }

    /// A handle onto the accumulator, for readers outside the processing loop.
    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    fn plural_subject(&self) -> String {
        match self.config.subject_name.as_str() {
            "Person" => "People".to_string(),
            other => format!("{other}s"),
        }
    }
}

/// The rollup portion of the overlay.
pub fn metrics_lines(subjects: &str, metrics: &RollupMetrics) -> Vec<String> {
    vec![
        format!("Total {} seen: {}", subjects, metrics.count),
        format!("Total time: {:.2} sec", metrics.total),
        format!("Average time: {:.1} sec", metrics.average),
        format!("Longest individual time: {:.2} sec", metrics.max),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_people_counter() {
        let config = PipelineConfig::default();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.labels, vec!["person".to_string()]);
        assert_eq!(config.deregister_frames, 20);
        assert_eq!(config.max_distance, 50.0);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "labels": ["car"], "subject_name": "Car" }"#).unwrap();
        assert_eq!(config.labels, vec!["car".to_string()]);
        assert_eq!(config.subject_name, "Car");
        assert_eq!(config.deregister_frames, 20);
    }

    #[test]
    fn metrics_lines_format() {
        let lines = metrics_lines(
            "people",
            &RollupMetrics {
                count: 3,
                total: 8.0,
                average: 8.0 / 3.0,
                max: 5.0,
            },
        );
        assert_eq!(
            lines,
            vec![
                "Total people seen: 3",
                "Total time: 8.00 sec",
                "Average time: 2.7 sec",
                "Longest individual time: 5.00 sec",
            ]
        );
    }
}
