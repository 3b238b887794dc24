//! CSV export of reconstructed samples
//!
//! One row per sample: system time in seconds (microsecond precision)
//! followed by the 16 channel readings.

use crate::protocol::schema::CHANNELS;
use crate::reconstruct::{ReconstructedSample, Reconstruction};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while writing CSV output
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column names, used when a header row is requested
pub fn header() -> Vec<String> {
    std::iter::once("time_s".to_string())
        .chain((1..=CHANNELS).map(|c| format!("ch{c}")))
        .collect()
}

/// Write samples as CSV rows to any sink
pub fn write_csv<W: Write>(samples: &[ReconstructedSample], sink: W, with_header: bool) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
    if with_header {
        writer.write_record(header())?;
    }

    let mut record = Vec::with_capacity(CHANNELS + 1);
    for sample in samples {
        record.clear();
        record.push(format!("{:.6}", sample.system_time_s));
        record.extend(sample.channels.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every sample of a reconstruction to one file
pub fn export_csv(reconstruction: &Reconstruction, path: &Path, with_header: bool) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_csv(&reconstruction.samples, file, with_header)?;
    tracing::info!(path = %path.display(), rows = reconstruction.samples.len(), "Wrote CSV");
    Ok(())
}

/// Path of segment `n` next to `base`: `<stem>_segNNN.csv`
pub fn segment_path(base: &Path, n: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    base.with_file_name(format!("{stem}_seg{n:03}.csv"))
}

/// Write one file per contiguous segment; returns the paths written
pub fn export_segments(
    reconstruction: &Reconstruction,
    base: &Path,
    with_header: bool,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut paths = Vec::new();
    for (n, segment) in reconstruction.segments().into_iter().enumerate() {
        let path = segment_path(base, n);
        let file = std::fs::File::create(&path)?;
        write_csv(segment, file, with_header)?;
        tracing::debug!(path = %path.display(), rows = segment.len(), "Wrote segment");
        paths.push(path);
    }
    tracing::info!(segments = paths.len(), "Wrote segmented CSV");
    Ok(paths)
}
