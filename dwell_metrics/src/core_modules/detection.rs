// THEORY:
// The `detection` module describes what the engine needs from an object
// detector, and nothing more. Inference itself belongs to an external toolkit;
// the pipeline only sees labeled boxes with a confidence and the time the model
// took. Keeping the boundary this narrow lets the live runner plug in an OpenCV
// DNN model while tests plug in a scripted fake.

use crate::core_modules::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An axis-aligned box in pixel coordinates, top-left to bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl BoundingBox {
    pub fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    pub fn width(&self) -> f64 {
        (self.end_x - self.start_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.end_y - self.start_y).max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.start_x + self.end_x) / 2.0,
            (self.start_y + self.end_y) / 2.0,
        )
    }
}

/// A single labeled detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The class name, later rewritten by the pipeline into a display label.
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Everything a detector reports for one frame.
#[derive(Debug, Clone, Default)]
pub struct DetectionResults {
    pub predictions: Vec<Prediction>,
    /// Wall time spent inside the model.
    pub duration: Duration,
}

/// An object detection engine.
pub trait ObjectDetector {
    /// The image type this engine consumes.
    type Frame;

    /// Identifier of the loaded model, shown on the overlay.
    fn model_id(&self) -> &str;

    /// Runs inference and returns predictions at or above `confidence`.
    fn detect_objects(
        &mut self,
        frame: &Self::Frame,
        confidence: f32,
    ) -> Result<DetectionResults, PipelineError>;
}

/// Keeps only predictions whose label is one of `labels`.
pub fn filter_predictions_by_label<S: AsRef<str>>(
    predictions: Vec<Prediction>,
    labels: &[S],
) -> Vec<Prediction> {
    predictions
        .into_iter()
        .filter(|p| labels.iter().any(|l| l.as_ref() == p.label))
        .collect()
}
