// A camera-free demo of the `dwell_metrics` library: a few synthetic people walk
// through a 640x480 scene and the pipeline reports their dwell times.

use dwell_metrics::core_modules::detection::{
    BoundingBox, DetectionResults, ObjectDetector, Prediction,
};
use dwell_metrics::PipelineError;
use dwell_metrics::pipeline::{OccupancyPipeline, PipelineConfig};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const FRAMES: u32 = 120;

/// A "frame" here is just the list of people standing in it.
struct SceneDetector;

impl ObjectDetector for SceneDetector {
    type Frame = Vec<Prediction>;

    fn model_id(&self) -> &str {
        "synthetic/walkers"
    }

    fn detect_objects(
        &mut self,
        frame: &Self::Frame,
        confidence: f32,
    ) -> Result<DetectionResults, PipelineError> {
        Ok(DetectionResults {
            predictions: frame
                .iter()
                .filter(|p| p.confidence >= confidence)
                .cloned()
                .collect(),
            duration: Duration::from_millis(12),
        })
    }
}

/// Walker `n` enters at frame `20 * n`, crosses left to right at 8 px per frame.
fn scene_at(frame: u32) -> Vec<Prediction> {
    let mut people = Vec::new();
    for n in 0..4u32 {
        let Some(step) = frame.checked_sub(20 * n) else {
            continue;
        };
        let x = 8.0 * step as f64;
        if x > 640.0 {
            continue;
        }
        let y = 100.0 + 80.0 * n as f64;
        people.push(Prediction::new(
            "person",
            0.9,
            BoundingBox::new(x, y, x + 40.0, y + 90.0),
        ));
    }
    // Background clutter the label filter should ignore.
    people.push(Prediction::new("chair", 0.95, BoundingBox::new(500.0, 400.0, 560.0, 470.0)));
    people
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Dwell Metrics - Example Runner");
    let mut pipeline = OccupancyPipeline::with_centroid_tracker(SceneDetector, PipelineConfig::default());

    let start = Instant::now();
    let mut last_report = None;
    for frame in 0..FRAMES {
        let now = start + FRAME_INTERVAL * frame;
        match pipeline.process_frame(now, &scene_at(frame)) {
            Ok(report) => {
                if frame % 30 == 0 {
                    for line in &report.text {
                        info!("{line}");
                    }
                }
                last_report = Some(report);
            }
            Err(e) => {
                tracing::error!("frame {frame} failed: {e}");
                return;
            }
        }
    }

    if let Some(report) = last_report {
        let m = report.metrics;
        info!(
            "Seen {} people, total {:.2} s, average {:.2} s, longest {:.2} s",
            m.count, m.total, m.average, m.max
        );
    }
}
