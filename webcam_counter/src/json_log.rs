use anyhow::{Context, Result};
use dwell_metrics::RollupMetrics;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

#[derive(Serialize)]
pub struct SessionLog {
    pub event: &'static str,
    pub timestamp: String,
    pub camera: i32,
    pub model: String,
    pub confidence: f32,
    pub labels: Vec<String>,
    pub deregister_frames: u32,
    pub max_distance: f64,
}

#[derive(Serialize)]
pub struct FrameLog {
    pub event: &'static str,
    pub timestamp: String,
    pub frame_index: u64,
    pub visible: usize,
    pub inference_secs: f64,
    pub metrics: RollupMetrics,
}

#[derive(Serialize)]
pub struct SummaryLog {
    pub event: &'static str,
    pub timestamp: String,
    pub frames: u64,
    pub elapsed_secs: f64,
    pub fps: f64,
    pub metrics: RollupMetrics,
}

/// Writes one JSON object per line.
pub struct JsonLogger {
    writer: BufWriter<File>,
}

impl JsonLogger {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
