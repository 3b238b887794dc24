//! Samples-per-second reporting

use std::time::{Duration, Instant};

/// Accumulates sample counts and yields a rate once per interval
#[derive(Debug)]
pub struct ThroughputMeter {
    interval: Duration,
    window_start: Instant,
    samples: u64,
}

impl ThroughputMeter {
    /// Start a meter reporting every `interval`
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            window_start: now,
            samples: 0,
        }
    }

    /// Add samples; returns samples/s when an interval has elapsed
    pub fn record(&mut self, samples: u64, now: Instant) -> Option<f64> {
        self.samples += samples;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let rate = self.samples as f64 / elapsed.as_secs_f64();
        self.samples = 0;
        self.window_start = now;
        Some(rate)
    }
}
