pub mod detection;
pub mod error;
pub mod fps;
pub mod metrics_manager;
pub mod shared_metrics;
pub mod tracker;
