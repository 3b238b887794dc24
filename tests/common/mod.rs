//! Synthetic device data shared by the e2e tests

#![allow(dead_code)]

use bcilog::protocol::schema::CHANNELS;
use bcilog::{LogRecord, LogWriter, PacketPair};

/// Deterministic generator for latencies and channel noise
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    /// Uniform in [0, max)
    pub fn next_f64(&mut self, max: f64) -> f64 {
        self.next_u32() as f64 / (1u64 << 31) as f64 * max
    }
}

/// Channel readings that vary with the sample index
pub fn channels_for(index: i64) -> [i32; CHANNELS] {
    let mut channels = [0i32; CHANNELS];
    for (c, value) in channels.iter_mut().enumerate() {
        *value = ((index * 31 + c as i64 * 1_000) % 2_000_000 - 1_000_000) as i32;
    }
    channels
}

/// A simulated acquisition run
pub struct Device {
    /// Samples per second
    pub rate_hz: f64,
    /// Hardware clock at index 0 (ms)
    pub hw_start_ms: f64,
    /// Capture ms per hardware ms
    pub clock_ratio: f64,
    /// Capture latency upper bound (ms)
    pub max_latency_ms: f64,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            rate_hz: 250.0,
            hw_start_ms: 12_345.0,
            clock_ratio: 1.0,
            max_latency_ms: 15.0,
        }
    }
}

impl Device {
    /// Exact hardware time of a sample (ms)
    pub fn hw_time_ms(&self, index: i64) -> f64 {
        self.hw_start_ms + index as f64 * 1000.0 / self.rate_hz
    }

    /// Capture time the logger would have stamped, before latency (ms)
    pub fn capture_base_ms(&self, index: i64) -> f64 {
        100.0 + (self.hw_time_ms(index) - self.hw_start_ms) * self.clock_ratio
    }

    /// Log records for the given (increasing) sample indices
    pub fn records(&self, indices: impl IntoIterator<Item = i64>, seed: u64) -> Vec<LogRecord> {
        let mut rng = Lcg::new(seed);
        indices
            .into_iter()
            .map(|index| {
                // The device clock is a wrapping u32
                let hw = self.hw_time_ms(index).floor() as u64 as u32;
                let latency = rng.next_f64(self.max_latency_ms);
                LogRecord {
                    capture_timestamp_ms: (self.capture_base_ms(index) + latency).floor() as u64 as u32,
                    pair: PacketPair::new((index % 256) as u8, hw, channels_for(index)),
                }
            })
            .collect()
    }
}

/// Serialize records to a log image
pub fn log_image(records: &[LogRecord]) -> Vec<u8> {
    let mut writer = LogWriter::new(Vec::new());
    for record in records {
        writer
            .append(record.capture_timestamp_ms, &record.pair.to_bytes())
            .unwrap();
    }
    writer.into_inner().unwrap()
}

/// Concatenated wire bytes of consecutive pairs
pub fn wire_stream(first_index: i64, count: usize) -> Vec<u8> {
    let device = Device::default();
    device
        .records(first_index..first_index + count as i64, 1)
        .iter()
        .flat_map(|r| r.pair.to_bytes())
        .collect()
}
