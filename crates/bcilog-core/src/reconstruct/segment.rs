//! Contiguous-run segmentation

use std::ops::Range;

/// Positions where a new run starts (index step other than 1)
///
/// # Example
/// ```
/// use bcilog_core::reconstruct::split_points;
///
/// assert_eq!(split_points(&[0, 1, 2, 5, 6, 7]), vec![3]);
/// ```
pub fn split_points(index: &[i64]) -> Vec<usize> {
    index
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] - w[0] != 1)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Maximal runs with unit index steps, covering `0..index.len()`
pub fn contiguous_runs(index: &[i64]) -> Vec<Range<usize>> {
    if index.is_empty() {
        return Vec::new();
    }

    let mut runs = Vec::new();
    let mut start = 0;
    for split in split_points(index) {
        runs.push(start..split);
        start = split;
    }
    runs.push(start..index.len());
    runs
}
