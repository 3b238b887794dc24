//! Sample-number unwrapping
//!
//! The device counts samples with an 8-bit counter. A non-positive step
//! between consecutive records is read as one 256-count wrap. Larger losses
//! can hide a further wrap, which only the hardware clock reveals: if the
//! step implied by the clock exceeds the candidate step by more than the
//! residual threshold, that boundary gets one more wrap and the candidate
//! index is rebuilt. The loop stops once no boundary changes.

use super::{ReconstructError, ReconstructParams};
use crate::protocol::schema::SAMPLE_NUMBER_MODULUS;

/// Result of unwrapping one log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnwrappedIndex {
    /// Strictly increasing sample index, starting at the first sample number
    pub index: Vec<i64>,
    /// Boundaries (position of the earlier record) that needed clock-detected wraps
    pub corrected_boundaries: Vec<usize>,
    /// Candidate rebuilds performed
    pub iterations: usize,
}

fn candidate_index(first: u8, raw_steps: &[i64], wraps: &[i64]) -> Vec<i64> {
    let mut index = Vec::with_capacity(raw_steps.len() + 1);
    let mut acc = first as i64;
    index.push(acc);
    for (&step, &w) in raw_steps.iter().zip(wraps) {
        acc += step + SAMPLE_NUMBER_MODULUS * w;
        index.push(acc);
    }
    index
}

fn check_increasing(index: &[i64]) -> Result<(), ReconstructError> {
    match index.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(ReconstructError::NonIncreasingIndex {
            position: i + 1,
            previous: index[i],
            current: index[i + 1],
        }),
        None => Ok(()),
    }
}

fn check_span(index: &[i64], params: &ReconstructParams) -> Result<i64, ReconstructError> {
    let records = index.len();
    let span = index[records - 1] - index[0];
    let slots = (span + 1) as f64;
    if (slots - records as f64).abs() > params.sample_count_tolerance * records as f64 {
        return Err(ReconstructError::SampleCountOutOfBounds {
            span,
            records,
            tolerance: params.sample_count_tolerance,
        });
    }
    Ok(span)
}

/// Convert wrapping sample numbers to a strictly increasing index
///
/// `hw_ms` is the unwrapped hardware clock of each record (see
/// [`super::unwrap_clock`]).
///
/// # Example
/// ```
/// use bcilog_core::reconstruct::{unwrap_sample_numbers, ReconstructParams};
///
/// let numbers = [254u8, 255, 0, 1];
/// let hw_ms = [100i64, 101, 102, 103];
/// let result = unwrap_sample_numbers(&numbers, &hw_ms, &ReconstructParams::default()).unwrap();
/// assert_eq!(result.index, vec![254, 255, 256, 257]);
/// ```
pub fn unwrap_sample_numbers(
    sample_numbers: &[u8],
    hw_ms: &[i64],
    params: &ReconstructParams,
) -> Result<UnwrappedIndex, ReconstructError> {
    if sample_numbers.len() != hw_ms.len() {
        return Err(ReconstructError::LengthMismatch {
            expected: sample_numbers.len(),
            actual: hw_ms.len(),
        });
    }

    let records = sample_numbers.len();
    let Some(&first) = sample_numbers.first() else {
        return Ok(UnwrappedIndex::default());
    };

    let raw_steps: Vec<i64> = sample_numbers
        .windows(2)
        .map(|w| w[1] as i64 - w[0] as i64)
        .collect();
    let mut wraps: Vec<i64> = raw_steps.iter().map(|&s| i64::from(s <= 0)).collect();

    let hw_span = hw_ms[records - 1] - hw_ms[0];
    let mut corrected_boundaries = Vec::new();
    let mut last_changed = 0;

    for iteration in 1..=params.max_wrap_iterations {
        let index = candidate_index(first, &raw_steps, &wraps);
        check_increasing(&index)?;
        let span = check_span(&index, params)?;

        if records < 2 {
            return Ok(UnwrappedIndex {
                index,
                corrected_boundaries,
                iterations: iteration,
            });
        }
        if hw_span <= 0 {
            return Err(ReconstructError::HardwareClockStalled {
                span_ms: hw_span,
                records,
            });
        }

        let samples_per_ms = span as f64 / hw_span as f64;
        let mut changed = 0usize;
        for (i, (wrap, &step)) in wraps.iter_mut().zip(&raw_steps).enumerate() {
            let implied = samples_per_ms * (hw_ms[i + 1] - hw_ms[i]) as f64;
            let candidate = step + SAMPLE_NUMBER_MODULUS * *wrap;
            let residual = implied - candidate as f64;
            if residual > params.wrap_residual_threshold {
                *wrap += 1;
                changed += 1;
                last_changed = i;
                if !corrected_boundaries.contains(&i) {
                    corrected_boundaries.push(i);
                }
                tracing::debug!(
                    boundary = i,
                    residual = %format!("{:.1}", residual),
                    wraps = *wrap,
                    "Clock reveals additional wrap"
                );
            }
        }

        if changed == 0 {
            corrected_boundaries.sort_unstable();
            return Ok(UnwrappedIndex {
                index,
                corrected_boundaries,
                iterations: iteration,
            });
        }
        tracing::debug!(iteration, changed, "Rebuilding sample index");
    }

    Err(ReconstructError::WrapSearchDidNotConverge {
        iterations: params.max_wrap_iterations,
        boundary: last_changed,
    })
}
