use anyhow::{Context, Result};
use dwell_metrics::PipelineError;
use dwell_metrics::core_modules::detection::{
    BoundingBox, DetectionResults, ObjectDetector, Prediction,
};
use opencv::{
    core::{self, Mat, Scalar, Size},
    dnn,
    prelude::*,
};
use std::path::Path;
use std::time::Instant;

/// Class names of the Caffe MobileNet-SSD (PASCAL VOC), indexed by class id.
const VOC_LABELS: [&str; 21] = [
    "background", "aeroplane", "bicycle", "bird", "boat", "bottle", "bus", "car", "cat", "chair",
    "cow", "diningtable", "dog", "horse", "motorbike", "person", "pottedplant", "sheep", "sofa",
    "train", "tvmonitor",
];
const INPUT_SIZE: i32 = 300;
const SCALE: f64 = 0.007843;
const MEAN: f64 = 127.5;
/// Each SSD detection row is [image_id, class_id, confidence, x0, y0, x1, y1].
const ROW_LEN: usize = 7;

/// MobileNet-SSD served by the OpenCV DNN module.
pub struct DnnDetector {
    net: dnn::Net,
    model_id: String,
}

impl DnnDetector {
    pub fn load(prototxt: &Path, weights: &Path) -> Result<Self> {
        let prototxt_str = prototxt.to_str().context("prototxt path is not valid UTF-8")?;
        let weights_str = weights.to_str().context("model path is not valid UTF-8")?;
        let net = dnn::read_net_from_caffe(prototxt_str, weights_str)
            .with_context(|| format!("Failed to load Caffe model {}", weights.display()))?;
        let model_id = weights
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mobilenet_ssd".to_string());
        Ok(Self { net, model_id })
    }

    fn run(&mut self, frame: &Mat, confidence: f32) -> opencv::Result<Vec<Prediction>> {
        let blob = dnn::blob_from_image(
            frame,
            SCALE,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            Scalar::all(MEAN),
            false,
            false,
            core::CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let output = self.net.forward_single("")?;

        let width = frame.cols() as f64;
        let height = frame.rows() as f64;
        let mut predictions = Vec::new();
        for i in 0..(output.total() / ROW_LEN) as i32 {
            let score = *output.at_nd::<f32>(&[0, 0, i, 2])?;
            if score < confidence {
                continue;
            }
            let class_id = *output.at_nd::<f32>(&[0, 0, i, 1])? as usize;
            let Some(label) = VOC_LABELS.get(class_id) else {
                continue;
            };
            let coord = |j: i32| -> opencv::Result<f64> {
                Ok((*output.at_nd::<f32>(&[0, 0, i, j])? as f64).clamp(0.0, 1.0))
            };
            predictions.push(Prediction::new(
                *label,
                score,
                BoundingBox::new(
                    coord(3)? * width,
                    coord(4)? * height,
                    coord(5)? * width,
                    coord(6)? * height,
                ),
            ));
        }
        Ok(predictions)
    }
}

impl ObjectDetector for DnnDetector {
    type Frame = Mat;

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn detect_objects(&mut self, frame: &Mat, confidence: f32) -> Result<DetectionResults, PipelineError> {
        let started = Instant::now();
        let predictions = self
            .run(frame, confidence)
            .map_err(|e| PipelineError::Detector(e.to_string()))?;
        Ok(DetectionResults {
            predictions,
            duration: started.elapsed(),
        })
    }
}
