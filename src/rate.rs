use std::time::Instant;

/// Frames over which the period estimate settles.
const TIME_CONSTANT: f32 = 16.0;
/// Intervals at or above this many seconds are treated as a stall.
const MAX_INTERVAL: f32 = 100.0;

/// Smoothed frame-rate estimate, updated once per displayed frame.
///
/// A single-pole IIR filter over the frame period, seeded with the first
/// interval. A non-positive or very long interval resets the estimate.
#[derive(Debug, Clone, Default)]
pub struct FrameRateEstimator {
    period: f32,
    last: Option<Instant>,
}

impl FrameRateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at the current time and returns the new estimate.
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            self.tick_interval(now.duration_since(last).as_secs_f32());
        }
        self.fps()
    }

    /// Feeds one inter-frame interval in seconds.
    pub fn tick_interval(&mut self, interval: f32) -> Option<f32> {
        if interval <= 0.0 || interval >= MAX_INTERVAL {
            self.period = 0.0;
        } else if self.period == 0.0 {
            self.period = interval;
        } else {
            self.period += (interval - self.period) / TIME_CONSTANT;
        }
        self.fps()
    }

    pub fn fps(&self) -> Option<f32> {
        (self.period > 0.0).then(|| 1.0 / self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_to_steady_rate() {
        let mut rate = FrameRateEstimator::new();
        let mut fps = None;
        for _ in 0..400 {
            fps = rate.tick_interval(1.0 / 30.0);
        }
        assert!((fps.unwrap() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_first_interval_seeds_estimate() {
        let mut rate = FrameRateEstimator::new();
        let fps = rate.tick_interval(1.0 / 30.0).unwrap();
        assert!((fps - 30.0).abs() < 1e-3);

        let fps = rate.tick_interval(0.5).unwrap();
        let period = 1.0 / 30.0 + (0.5 - 1.0 / 30.0) / 16.0;
        assert!((fps - 1.0 / period).abs() < 1e-3);
    }

    #[test]
    fn test_interval_after_stall_reseeds_estimate() {
        let mut rate = FrameRateEstimator::new();
        for _ in 0..10 {
            rate.tick_interval(0.1);
        }
        assert_eq!(rate.tick_interval(150.0), None);
        let fps = rate.tick_interval(1.0 / 30.0).unwrap();
        assert!((fps - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_stall_resets_estimate() {
        let mut rate = FrameRateEstimator::new();
        rate.tick_interval(0.04);
        assert!(rate.fps().is_some());
        assert_eq!(rate.tick_interval(150.0), None);
        rate.tick_interval(0.04);
        assert_eq!(rate.tick_interval(0.0), None);
    }

    #[test]
    fn test_first_tick_has_no_estimate() {
        let mut rate = FrameRateEstimator::new();
        assert_eq!(rate.tick(), None);
    }
}
