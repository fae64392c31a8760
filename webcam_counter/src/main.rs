// Live people counter: webcam frames go through a MobileNet-SSD detector and a
// centroid tracker, and the window shows how long each person has been in view
// alongside the running occupancy metrics.

mod detector;
mod json_log;
mod overlay;

use anyhow::{bail, Context, Result};
use clap::Parser;
use detector::DnnDetector;
use dwell_metrics::core_modules::fps::FpsCounter;
use dwell_metrics::pipeline::{OccupancyPipeline, PipelineConfig, RollupMetrics, SharedMetrics};
use json_log::{timestamp_now, FrameLog, JsonLogger, SessionLog, SummaryLog};
use opencv::{
    core::Mat,
    highgui,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WINDOW_NAME: &str = "webcam_counter";
const KEY_ESC: i32 = 27;
const KEY_Q: i32 = 113;

#[derive(Parser, Debug)]
#[command(name = "webcam_counter", about = "Count people in view and how long each one stays")]
struct Args {
    /// Camera index passed to the capture backend.
    #[arg(long, default_value_t = 0)]
    camera: i32,
    #[arg(long, value_name = "PATH", default_value = "models/MobileNetSSD_deploy.prototxt")]
    prototxt: PathBuf,
    #[arg(long, value_name = "PATH", default_value = "models/MobileNetSSD_deploy.caffemodel")]
    model: PathBuf,
    #[arg(long, default_value_t = 0.8)]
    confidence: f32,
    /// Detector label to count; repeat for several.
    #[arg(long = "label", value_name = "LABEL", default_value = "person")]
    labels: Vec<String>,
    #[arg(long, default_value_t = 20)]
    deregister_frames: u32,
    #[arg(long, default_value_t = 50.0)]
    max_distance: f64,
    /// Seconds to let the camera settle before counting.
    #[arg(long, default_value_t = 2.0)]
    warmup_secs: f64,
    #[arg(long)]
    headless: bool,
    #[arg(long, value_name = "PATH")]
    log_json: Option<PathBuf>,
    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<u64>,
    #[arg(long, default_value_t = 5)]
    summary_interval_secs: u64,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            confidence_threshold: self.confidence,
            labels: self.labels.clone(),
            deregister_frames: self.deregister_frames,
            max_distance: self.max_distance,
            ..PipelineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("webcam_counter=info,dwell_metrics=info")),
        )
        .with_target(false)
        .init();
    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    // --- 1. Model & Pipeline Initialization ---
    let detector = DnnDetector::load(&args.prototxt, &args.model)?;
    info!("Engine: OpenCV DNN");
    info!("Accelerator: CPU");
    info!("Model: {}", args.model.display());
    let mut pipeline = OccupancyPipeline::with_centroid_tracker(detector, args.pipeline_config());

    let mut json_logger = match args.log_json.as_ref() {
        Some(path) => Some(JsonLogger::new(path)?),
        None => None,
    };
    if let Some(logger) = json_logger.as_mut() {
        logger.write_event(&SessionLog {
            event: "session_start",
            timestamp: timestamp_now(),
            camera: args.camera,
            model: args.model.display().to_string(),
            confidence: args.confidence,
            labels: args.labels.clone(),
            deregister_frames: args.deregister_frames,
            max_distance: args.max_distance,
        })?;
        logger.flush()?;
    }

    // --- 2. Video I/O Initialization ---
    let cap = VideoCapture::new(args.camera, videoio::CAP_ANY)
        .with_context(|| format!("Failed to open camera {}", args.camera))?;
    if !cap.is_opened()? {
        bail!("Camera {} could not be opened", args.camera);
    }

    let mut display_enabled = !args.headless;
    if display_enabled {
        if let Err(err) = highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE) {
            warn!("Failed to open display window: {}. Running headless.", err);
            display_enabled = false;
        }
    }

    // Allow the webcam to warm up.
    tokio::time::sleep(Duration::from_secs_f64(args.warmup_secs.max(0.0))).await;

    let (frames_tx, mut frames_rx) = mpsc::channel::<Mat>(1);
    let capture = spawn_capture(cap, frames_tx);
    let summary = spawn_summary(pipeline.metrics(), args.summary_interval_secs);

    let mut fps = FpsCounter::new();
    fps.start();

    // --- 3. Main Processing Loop ---
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut frame_index: u64 = 0;
    let mut last_metrics = RollupMetrics::default();
    let outcome = async {
        loop {
            let frame = tokio::select! {
                frame = frames_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => {
                        warn!("Capture stopped delivering frames");
                        break;
                    }
                },
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            };

            let report = pipeline
                .process_frame(Instant::now(), &frame)
                .with_context(|| format!("Failed to process frame {}", frame_index + 1))?;
            frame_index += 1;
            last_metrics = report.metrics;

            if let Some(logger) = json_logger.as_mut() {
                logger.write_event(&FrameLog {
                    event: "frame",
                    timestamp: timestamp_now(),
                    frame_index,
                    visible: report.predictions.len(),
                    inference_secs: report.inference_duration.as_secs_f64(),
                    metrics: report.metrics,
                })?;
            }

            if display_enabled {
                let mut annotated = frame.clone();
                overlay::markup_image(&mut annotated, &report.predictions)?;
                let shown = overlay::with_text_panel(&annotated, &report.text)?;
                highgui::imshow(WINDOW_NAME, &shown)?;
                if check_exit()? {
                    break;
                }
            }

            fps.update();
            if args.max_frames.is_some_and(|max| frame_index >= max) {
                break;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    // --- 4. Shutdown ---
    fps.stop();
    summary.abort();
    drop(frames_rx);
    match capture.await {
        Ok(Err(e)) => warn!("Capture ended with an error: {e:#}"),
        Err(e) => warn!("Capture task failed: {e}"),
        Ok(Ok(())) => {}
    }

    info!("elapsed time: {:.2}", fps.elapsed().as_secs_f64());
    info!("approx. FPS: {:.2}", fps.compute_fps());
    if let Some(logger) = json_logger.as_mut() {
        logger.write_event(&SummaryLog {
            event: "summary",
            timestamp: timestamp_now(),
            frames: frame_index,
            elapsed_secs: fps.elapsed().as_secs_f64(),
            fps: fps.compute_fps(),
            metrics: last_metrics,
        })?;
        logger.flush()?;
    }
    info!("Program Ending");
    outcome
}

/// Reads frames on a blocking thread so capture never waits on inference.
fn spawn_capture(mut cap: VideoCapture, frames_tx: mpsc::Sender<Mat>) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || {
        loop {
            let mut frame = Mat::default();
            if !cap.read(&mut frame)? || frame.empty() {
                break;
            }
            if frames_tx.blocking_send(frame).is_err() {
                // Receiver dropped: the processing loop has finished.
                break;
            }
        }
        Ok(())
    })
}

/// Logs the running rollup every `interval_secs`.
fn spawn_summary(metrics: SharedMetrics, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match metrics.rollup_metrics() {
                Ok(m) => info!(
                    "seen={} total={:.2}s avg={:.1}s max={:.2}s",
                    m.count, m.total, m.average, m.max
                ),
                Err(e) => {
                    warn!("Stopping periodic summary: {e}");
                    break;
                }
            }
        }
    })
}

/// True once the user presses `q` or Esc in the display window.
fn check_exit() -> opencv::Result<bool> {
    let key = highgui::wait_key(1)?;
    Ok(key == KEY_ESC || key == KEY_Q)
}
