//! Hardware and system time reconstruction
//!
//! The hardware clock ticks in whole milliseconds, coarser than the sample
//! period. A local sample-period estimate over a symmetric window is
//! integrated along the index to get sub-millisecond times, then anchored to
//! the raw clock by the mean offset.
//!
//! The capture clock carries unknown, always non-negative latency. A
//! least-squares line through (hardware time, capture time) gives the drift
//! ratio; the intercept is then lowered until the line touches the earliest
//! arrival so no sample is timestamped after it was received.

use super::{ReconstructError, ReconstructParams};
use serde::{Deserialize, Serialize};

/// Tolerance for rounding noise on the "never later than arrival" check
const DEVIATION_EPSILON_MS: f64 = 1e-6;

/// Sub-millisecond hardware time per record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HardwareTimeAxis {
    /// Reconstructed hardware time (ms)
    pub times_ms: Vec<f64>,
    /// Radius of the rate window in records (0 means global rate)
    pub window_radius: usize,
    /// Largest |raw - reconstructed| (ms)
    pub max_residual_ms: f64,
}

/// Linear map from hardware time to system time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemClockFit {
    /// System ms per hardware ms
    pub slope: f64,
    /// System time (ms) at hardware time zero
    pub intercept_ms: f64,
    /// Largest capture latency seen under the fit (ms)
    pub max_latency_ms: f64,
}

impl SystemClockFit {
    /// System time (ms) of a hardware instant
    pub fn apply(&self, hw_ms: f64) -> f64 {
        self.slope * hw_ms + self.intercept_ms
    }
}

fn window_radius(records: usize, total_slots: i64, divisor: usize) -> usize {
    let wanted = (total_slots.max(0) as usize / divisor.max(1)).max(1);
    wanted.min((records - 1) / 2)
}

/// Per-record sample period (ms/sample) over a window of `radius`
fn local_periods(index: &[i64], hw_ms: &[i64], radius: usize) -> Vec<f64> {
    let n = index.len();
    if radius == 0 {
        let period = (hw_ms[n - 1] - hw_ms[0]) as f64 / (index[n - 1] - index[0]) as f64;
        return vec![period; n];
    }

    let mut periods = vec![0.0; n];
    for i in radius..n - radius {
        let d_hw = (hw_ms[i + radius] - hw_ms[i - radius]) as f64;
        let d_idx = (index[i + radius] - index[i - radius]) as f64;
        periods[i] = d_hw / d_idx;
    }
    let head = periods[radius];
    let tail = periods[n - radius - 1];
    periods[..radius].fill(head);
    periods[n - radius..].fill(tail);
    periods
}

/// Reconstruct sub-millisecond hardware times
///
/// `index` must be strictly increasing; `hw_ms` is the unwrapped hardware
/// clock of the same records.
pub fn hardware_time_axis(
    index: &[i64],
    hw_ms: &[i64],
    params: &ReconstructParams,
) -> Result<HardwareTimeAxis, ReconstructError> {
    if index.len() != hw_ms.len() {
        return Err(ReconstructError::LengthMismatch {
            expected: index.len(),
            actual: hw_ms.len(),
        });
    }
    let n = index.len();
    match n {
        0 => return Ok(HardwareTimeAxis::default()),
        1 => {
            return Ok(HardwareTimeAxis {
                times_ms: vec![hw_ms[0] as f64],
                window_radius: 0,
                max_residual_ms: 0.0,
            })
        }
        _ => {}
    }
    if let Some(i) = index.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ReconstructError::NonIncreasingIndex {
            position: i + 1,
            previous: index[i],
            current: index[i + 1],
        });
    }

    let total_slots = index[n - 1] - index[0] + 1;
    let radius = window_radius(n, total_slots, params.rate_window_divisor);
    let periods = local_periods(index, hw_ms, radius);

    let mut times = Vec::with_capacity(n);
    times.push(0.0);
    for i in 1..n {
        let step = (index[i] - index[i - 1]) as f64;
        times.push(times[i - 1] + step * periods[i]);
    }

    let offset = hw_ms
        .iter()
        .zip(&times)
        .map(|(&hw, &t)| hw as f64 - t)
        .sum::<f64>()
        / n as f64;
    for t in &mut times {
        *t += offset;
    }

    let mut max_residual_ms = 0.0f64;
    for (position, (&hw, &t)) in hw_ms.iter().zip(&times).enumerate() {
        let residual = hw as f64 - t;
        if residual.is_nan() || residual.abs() >= params.max_hw_residual_ms {
            return Err(ReconstructError::HardwareResidualTooLarge {
                position,
                residual_ms: residual,
                limit_ms: params.max_hw_residual_ms,
            });
        }
        max_residual_ms = max_residual_ms.max(residual.abs());
    }

    // A backwards clock step can stay inside the residual limit while turning
    // the windowed period negative
    if let Some(i) = times.windows(2).position(|w| w[1] < w[0]) {
        return Err(ReconstructError::HardwareTimeDecreasing {
            position: i + 1,
            previous_ms: times[i],
            current_ms: times[i + 1],
        });
    }

    tracing::debug!(
        records = n,
        window_radius = radius,
        max_residual_ms = %format!("{:.3}", max_residual_ms),
        "Hardware time axis built"
    );

    Ok(HardwareTimeAxis {
        times_ms: times,
        window_radius: radius,
        max_residual_ms,
    })
}

/// Check fitted-minus-raw deviations; returns the largest latency
fn check_deviations(deviations: impl Iterator<Item = f64>, limit_ms: f64) -> Result<f64, ReconstructError> {
    let mut max_latency = 0.0f64;
    for (position, deviation_ms) in deviations.enumerate() {
        if deviation_ms > DEVIATION_EPSILON_MS {
            return Err(ReconstructError::PositiveDeviation { position, deviation_ms });
        }
        if deviation_ms <= -limit_ms {
            return Err(ReconstructError::ExcessiveLatency {
                position,
                deviation_ms,
                limit_ms,
            });
        }
        max_latency = max_latency.max(-deviation_ms);
    }
    Ok(max_latency)
}

/// Fit the capture clock against reconstructed hardware time
pub fn fit_system_clock(
    hw_times_ms: &[f64],
    sys_ms: &[f64],
    params: &ReconstructParams,
) -> Result<SystemClockFit, ReconstructError> {
    if hw_times_ms.len() != sys_ms.len() {
        return Err(ReconstructError::LengthMismatch {
            expected: hw_times_ms.len(),
            actual: sys_ms.len(),
        });
    }
    let n = hw_times_ms.len();
    if n == 0 {
        return Ok(SystemClockFit {
            slope: 1.0,
            intercept_ms: 0.0,
            max_latency_ms: 0.0,
        });
    }

    let mean_t = hw_times_ms.iter().sum::<f64>() / n as f64;
    let mean_s = sys_ms.iter().sum::<f64>() / n as f64;
    let (cov, var) = hw_times_ms
        .iter()
        .zip(sys_ms)
        .fold((0.0, 0.0), |(cov, var), (&t, &s)| {
            let dt = t - mean_t;
            (cov + dt * (s - mean_s), var + dt * dt)
        });

    let slope = if var == 0.0 { 1.0 } else { cov / var };
    if !slope.is_finite() || slope <= 0.0 {
        return Err(ReconstructError::InvalidClockRatio { slope });
    }

    let intercept_ms = hw_times_ms
        .iter()
        .zip(sys_ms)
        .map(|(&t, &s)| s - slope * t)
        .fold(f64::INFINITY, f64::min);

    let fit = SystemClockFit {
        slope,
        intercept_ms,
        max_latency_ms: 0.0,
    };
    let deviations = hw_times_ms.iter().zip(sys_ms).map(|(&t, &s)| fit.apply(t) - s);
    let max_latency_ms = check_deviations(deviations, params.max_latency_ms)?;

    Ok(SystemClockFit { max_latency_ms, ..fit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic pseudo-random latencies in [0, 20) ms
    fn latencies(count: usize) -> Vec<f64> {
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                ((state >> 33) % 20_000) as f64 / 1000.0
            })
            .collect()
    }

    #[test]
    fn test_axis_recovers_sub_millisecond_times() {
        // 4 kHz: four samples per hardware tick
        let n = 20_000usize;
        let index: Vec<i64> = (0..n as i64).collect();
        let truth: Vec<f64> = index.iter().map(|&i| 1_000.0 + i as f64 * 0.25).collect();
        let hw: Vec<i64> = truth.iter().map(|t| t.floor() as i64).collect();

        let axis = hardware_time_axis(&index, &hw, &ReconstructParams::default()).unwrap();
        assert_eq!(axis.window_radius, 2);
        assert!(axis.max_residual_ms < 2.0);
        for (t, expected) in axis.times_ms.iter().zip(&truth) {
            assert!((t - expected).abs() < 2.0, "{t} vs {expected}");
        }
        assert!(axis.times_ms.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_round_trip_with_drift_and_latency() {
        let n = 20_000usize;
        let slope = 1.0001;
        let intercept = 123_456.0;
        let index: Vec<i64> = (0..n as i64).collect();
        let truth: Vec<f64> = index.iter().map(|&i| 50.0 + i as f64 / 3.0).collect();
        let hw: Vec<i64> = truth.iter().map(|t| t.floor() as i64).collect();
        let sys: Vec<f64> = truth
            .iter()
            .zip(latencies(n))
            .map(|(t, lat)| slope * t + intercept + lat)
            .collect();

        let params = ReconstructParams::default();
        let axis = hardware_time_axis(&index, &hw, &params).unwrap();
        let fit = fit_system_clock(&axis.times_ms, &sys, &params).unwrap();

        assert_relative_eq!(fit.slope, slope, epsilon = 1e-4);
        assert!(fit.max_latency_ms < 25.0);
        for (&t, &true_t) in axis.times_ms.iter().zip(&truth) {
            let reconstructed = fit.apply(t);
            let expected = slope * true_t + intercept;
            assert!((reconstructed - expected).abs() < 4.0);
        }
    }

    #[test]
    fn test_global_rate_for_two_records() {
        let axis = hardware_time_axis(&[0, 4], &[100, 116], &ReconstructParams::default()).unwrap();
        assert_eq!(axis.window_radius, 0);
        assert_relative_eq!(axis.times_ms[0], 100.0);
        assert_relative_eq!(axis.times_ms[1], 116.0);
    }

    #[test]
    fn test_gap_keeps_rate() {
        let index: Vec<i64> = (0..100).chain(150..300).collect();
        let hw: Vec<i64> = index.iter().map(|&i| 4 * i).collect();
        let axis = hardware_time_axis(&index, &hw, &ReconstructParams::default()).unwrap();
        for (t, &raw) in axis.times_ms.iter().zip(&hw) {
            assert_relative_eq!(*t, raw as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_clock_glitch_rejected() {
        let index: Vec<i64> = (0..100).collect();
        let mut hw: Vec<i64> = index.iter().map(|&i| 4 * i).collect();
        hw[50] += 20;
        let err = hardware_time_axis(&index, &hw, &ReconstructParams::default()).unwrap_err();
        assert!(matches!(err, ReconstructError::HardwareResidualTooLarge { .. }));
    }

    #[test]
    fn test_small_backwards_step_rejected() {
        let index: Vec<i64> = (0..20).collect();
        let mut hw: Vec<i64> = index.iter().map(|&i| 4 * i).collect();
        // Residuals stay at 4.5 ms, under the limit
        hw[10] -= 9;
        let err = hardware_time_axis(&index, &hw, &ReconstructParams::default()).unwrap_err();
        match err {
            ReconstructError::HardwareTimeDecreasing {
                position,
                previous_ms,
                current_ms,
            } => {
                assert_eq!(position, 9);
                assert_relative_eq!(previous_ms, 32.0, epsilon = 1e-9);
                assert_relative_eq!(current_ms, 31.5, epsilon = 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_axis_rejects_non_increasing_index() {
        let err = hardware_time_axis(&[0, 2, 2], &[0, 1, 2], &ReconstructParams::default()).unwrap_err();
        assert!(matches!(err, ReconstructError::NonIncreasingIndex { position: 2, .. }));
    }

    #[test]
    fn test_negative_ratio_rejected() {
        let err = fit_system_clock(&[0.0, 1.0, 2.0, 3.0], &[30.0, 20.0, 10.0, 0.0], &ReconstructParams::default())
            .unwrap_err();
        assert!(matches!(err, ReconstructError::InvalidClockRatio { .. }));
    }

    #[test]
    fn test_excessive_latency_rejected() {
        let hw: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let mut sys = hw.clone();
        sys[500] += 600.0;
        let err = fit_system_clock(&hw, &sys, &ReconstructParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::ExcessiveLatency { position: 500, .. }
        ));
    }

    #[test]
    fn test_fit_never_later_than_arrival() {
        let hw: Vec<f64> = (0..500).map(|i| i as f64 * 2.0).collect();
        let sys: Vec<f64> = hw
            .iter()
            .zip(latencies(500))
            .map(|(t, lat)| t + 7.0 + lat)
            .collect();
        let fit = fit_system_clock(&hw, &sys, &ReconstructParams::default()).unwrap();
        for (&t, &s) in hw.iter().zip(&sys) {
            assert!(fit.apply(t) <= s + DEVIATION_EPSILON_MS);
        }
    }

    #[test]
    fn test_positive_deviation_detected() {
        let err = check_deviations([0.0, -1.0, 0.5].into_iter(), 500.0).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::PositiveDeviation {
                position: 2,
                deviation_ms: 0.5
            }
        );
    }

    #[test]
    fn test_single_sample_fit() {
        let fit = fit_system_clock(&[10.0], &[25.0], &ReconstructParams::default()).unwrap();
        assert_eq!(fit.slope, 1.0);
        assert_relative_eq!(fit.apply(10.0), 25.0);
    }
}
