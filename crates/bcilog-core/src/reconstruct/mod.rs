//! Offline time-base reconstruction
//!
//! Turns the raw record sequence of a log into uniformly timestamped
//! samples:
//! - 8-bit sample numbers to a strictly increasing index ([`unwrap`])
//! - Sub-millisecond hardware time and drift-corrected system time ([`timebase`])
//! - Contiguous runs at index discontinuities ([`segment`])
//!
//! Every consistency check is fatal. A log that fails one produces no
//! output at all, since a silently wrong timestamp is worse than none.

pub mod segment;
pub mod timebase;
pub mod unwrap;

use crate::log::LogRecord;
use crate::protocol::schema::CHANNELS;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

pub use segment::{contiguous_runs, split_points};
pub use timebase::{fit_system_clock, hardware_time_axis, HardwareTimeAxis, SystemClockFit};
pub use unwrap::{unwrap_sample_numbers, UnwrappedIndex};

/// Thresholds of the reconstruction checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructParams {
    /// Clock-implied step excess (samples) that reveals a missed wrap
    pub wrap_residual_threshold: f64,
    /// Iteration bound of the wrap search
    pub max_wrap_iterations: usize,
    /// Allowed relative difference between index span and record count
    pub sample_count_tolerance: f64,
    /// Rate window radius is the sample count divided by this
    pub rate_window_divisor: usize,
    /// Largest tolerated |raw - reconstructed| hardware time (ms)
    pub max_hw_residual_ms: f64,
    /// Largest tolerated capture latency (ms)
    pub max_latency_ms: f64,
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self {
            wrap_residual_threshold: 100.0,
            max_wrap_iterations: 64,
            sample_count_tolerance: 0.10,
            rate_window_divisor: 10_000,
            max_hw_residual_ms: 5.0,
            max_latency_ms: 500.0,
        }
    }
}

/// Reasons a reconstruction run is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructError {
    #[error("Input length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Sample index not increasing at position {position}: {previous} -> {current}")]
    NonIncreasingIndex {
        position: usize,
        previous: i64,
        current: i64,
    },

    #[error("Sample index span {span} is outside {pct:.0}% of record count {records}", pct = .tolerance * 100.0)]
    SampleCountOutOfBounds {
        span: i64,
        records: usize,
        tolerance: f64,
    },

    #[error("Hardware clock does not advance: span {span_ms} ms over {records} records")]
    HardwareClockStalled { span_ms: i64, records: usize },

    #[error("Wrap search did not converge after {iterations} iterations (last changed boundary {boundary})")]
    WrapSearchDidNotConverge { iterations: usize, boundary: usize },

    #[error("Hardware time residual {residual_ms:.3} ms at position {position} exceeds {limit_ms} ms")]
    HardwareResidualTooLarge {
        position: usize,
        residual_ms: f64,
        limit_ms: f64,
    },

    #[error("Hardware time goes backwards at position {position}: {previous_ms:.3} ms -> {current_ms:.3} ms")]
    HardwareTimeDecreasing {
        position: usize,
        previous_ms: f64,
        current_ms: f64,
    },

    #[error("Invalid system/hardware clock ratio {slope}")]
    InvalidClockRatio { slope: f64 },

    #[error("System time deviation {deviation_ms:.3} ms at position {position} is positive")]
    PositiveDeviation { position: usize, deviation_ms: f64 },

    #[error("System time deviation {deviation_ms:.3} ms at position {position} exceeds latency limit {limit_ms} ms")]
    ExcessiveLatency {
        position: usize,
        deviation_ms: f64,
        limit_ms: f64,
    },
}

/// One row of the reconstructed series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructedSample {
    /// Unwrapped sample index
    pub index: i64,
    /// Sub-millisecond hardware time (ms)
    pub hardware_time_ms: f64,
    /// Drift-corrected system time (seconds)
    pub system_time_s: f64,
    /// The 16 channel readings
    pub channels: [i32; CHANNELS],
}

/// Result of a successful reconstruction run
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    /// Samples in ascending index order
    pub samples: Vec<ReconstructedSample>,
    /// Sample slots covered by the index minus samples present
    pub lost_samples: u64,
    /// Boundaries where the hardware clock revealed extra wraps
    pub corrected_boundaries: Vec<usize>,
    /// Records dropped for repeating the previous sample number and hardware time
    pub duplicates_skipped: u64,
    /// Radius of the local rate window
    pub window_radius: usize,
    /// Largest |raw - reconstructed| hardware time (ms)
    pub max_hw_residual_ms: f64,
    /// System clock fit; `None` for an empty log
    pub clock: Option<SystemClockFit>,
}

impl Reconstruction {
    /// Index ranges of maximal contiguous runs
    pub fn segment_ranges(&self) -> Vec<Range<usize>> {
        let index: Vec<i64> = self.samples.iter().map(|s| s.index).collect();
        contiguous_runs(&index)
    }

    /// Samples split into maximal contiguous runs
    pub fn segments(&self) -> Vec<&[ReconstructedSample]> {
        self.segment_ranges()
            .into_iter()
            .map(|range| &self.samples[range])
            .collect()
    }

    /// Rows of (system time in seconds, channels) for exporters
    pub fn rows(&self) -> Vec<(f64, [i32; CHANNELS])> {
        self.samples
            .iter()
            .map(|s| (s.system_time_s, s.channels))
            .collect()
    }
}

/// Unwrap a u32 millisecond counter into a monotonic i64 series
///
/// Consecutive differences are taken modulo 2^32 and read as signed, so a
/// counter rollover continues upward while a small backwards step stays
/// negative. The hardware time axis rejects any step that survives as a
/// decrease.
pub fn unwrap_clock(raw: &[u32]) -> Vec<i64> {
    let mut out = Vec::with_capacity(raw.len());
    let mut acc = match raw.first() {
        Some(&first) => first as i64,
        None => return out,
    };
    out.push(acc);
    for pair in raw.windows(2) {
        acc += pair[1].wrapping_sub(pair[0]) as i32 as i64;
        out.push(acc);
    }
    out
}

/// Drop records that repeat the previous kept record's sample number and
/// hardware timestamp
fn skip_repeated(records: &[LogRecord]) -> (Vec<&LogRecord>, u64) {
    let mut kept: Vec<&LogRecord> = Vec::with_capacity(records.len());
    for record in records {
        let repeated = kept.last().is_some_and(|prev| {
            prev.pair.sample_number() == record.pair.sample_number()
                && prev.pair.hw_timestamp_ms() == record.pair.hw_timestamp_ms()
        });
        if !repeated {
            kept.push(record);
        }
    }
    let skipped = (records.len() - kept.len()) as u64;
    (kept, skipped)
}

/// Run the full reconstruction over the records of one log
///
/// Records repeating the previous sample number and hardware timestamp are
/// retransmissions the logger kept under its duplicate policy; they are
/// skipped and counted.
pub fn reconstruct(records: &[LogRecord], params: &ReconstructParams) -> Result<Reconstruction, ReconstructError> {
    if records.is_empty() {
        return Ok(Reconstruction::default());
    }

    let (records, duplicates_skipped) = skip_repeated(records);
    if duplicates_skipped > 0 {
        tracing::warn!(duplicates_skipped, "Skipped repeated records");
    }

    let sample_numbers: Vec<u8> = records.iter().map(|r| r.pair.sample_number()).collect();
    let hw_raw: Vec<u32> = records.iter().map(|r| r.pair.hw_timestamp_ms()).collect();
    let sys_raw: Vec<u32> = records.iter().map(|r| r.capture_timestamp_ms).collect();
    let hw_ms = unwrap_clock(&hw_raw);
    let sys_ms: Vec<f64> = unwrap_clock(&sys_raw).into_iter().map(|v| v as f64).collect();

    let unwrapped = unwrap_sample_numbers(&sample_numbers, &hw_ms, params)?;
    let axis = hardware_time_axis(&unwrapped.index, &hw_ms, params)?;
    let fit = fit_system_clock(&axis.times_ms, &sys_ms, params)?;

    let samples: Vec<ReconstructedSample> = records
        .iter()
        .zip(&unwrapped.index)
        .zip(&axis.times_ms)
        .map(|((record, &index), &hw_time)| ReconstructedSample {
            index,
            hardware_time_ms: hw_time,
            system_time_s: fit.apply(hw_time) / 1000.0,
            channels: record.pair.channels(),
        })
        .collect();

    let span = unwrapped.index[unwrapped.index.len() - 1] - unwrapped.index[0] + 1;
    let lost_samples = (span as u64).saturating_sub(samples.len() as u64);

    tracing::info!(
        samples = samples.len(),
        lost_samples,
        duplicates_skipped,
        corrected_wraps = unwrapped.corrected_boundaries.len(),
        window_radius = axis.window_radius,
        slope = fit.slope,
        max_latency_ms = %format!("{:.3}", fit.max_latency_ms),
        "Reconstructed time base"
    );

    Ok(Reconstruction {
        samples,
        lost_samples,
        corrected_boundaries: unwrapped.corrected_boundaries,
        duplicates_skipped,
        window_radius: axis.window_radius,
        max_hw_residual_ms: axis.max_residual_ms,
        clock: Some(fit),
    })
}
