use std::time::{Duration, Instant};

/// Counts processed frames between `start` and `stop` to report throughput.
#[derive(Debug, Default, Clone)]
pub struct FpsCounter {
    started: Option<Instant>,
    stopped: Option<Instant>,
    frames: u64,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.started = Some(now);
        self.stopped = None;
        self.frames = 0;
    }

    pub fn update(&mut self) {
        self.frames += 1;
    }

    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        if self.started.is_some() {
            self.stopped = Some(now);
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Time between `start` and `stop` (or now, while still running).
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.stopped) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn compute_fps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_started_reports_zero() {
        let mut fps = FpsCounter::new();
        fps.update();
        fps.stop();
        assert_eq!(fps.elapsed(), Duration::ZERO);
        assert_eq!(fps.compute_fps(), 0.0);
    }

    #[test]
    fn frames_over_elapsed_time() {
        let start = Instant::now();
        let mut fps = FpsCounter::new();
        fps.start_at(start);
        for _ in 0..30 {
            fps.update();
        }
        fps.stop_at(start + Duration::from_secs(2));

        assert_eq!(fps.frames(), 30);
        assert_eq!(fps.elapsed(), Duration::from_secs(2));
        assert_eq!(fps.compute_fps(), 15.0);
    }
}
