//! E2E tests for the on-disk log
//!
//! Writes logs through the writer, reads them back through the framer,
//! reconstructs and exports CSV.

mod common;

use bcilog::export::{export_csv, export_segments};
use bcilog::log::{parse_log, read_log, LogReader};
use bcilog::protocol::schema::RECORD_LEN;
use bcilog::reconstruct::{reconstruct, ReconstructParams};
use bcilog::protocol::schema::PAIR_LEN;
use bcilog::{DuplicatePolicy, LiveLogger, LogWriter};
use common::{channels_for, log_image, wire_stream, Device};
use std::io::Write;

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("session.bci");
    let records = Device::default().records(0..500, 1);

    let mut writer = LogWriter::create(&path).unwrap();
    for record in &records {
        writer
            .append(record.capture_timestamp_ms, &record.pair.to_bytes())
            .unwrap();
    }
    writer.flush().unwrap();
    assert_eq!(writer.records_written(), 500);
    drop(writer);

    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (500 * RECORD_LEN) as u64
    );

    let contents = read_log(&path).unwrap();
    assert_eq!(contents.records, records);
    assert_eq!(contents.framing.resyncs, 0);
    assert_eq!(contents.trailing_bytes, 0);
}

/// A record cut short by a crash is ignored; earlier records survive
#[test]
fn test_truncated_tail() {
    let records = Device::default().records(0..50, 2);
    let mut image = log_image(&records);
    image.truncate(image.len() - 20);

    let contents = parse_log(&image);
    assert_eq!(contents.records.len(), 49);
    assert_eq!(contents.trailing_bytes, RECORD_LEN - 20);
}

/// A corrupted record is skipped and the rest of the log still reconstructs
#[test]
fn test_corruption_inside_log() {
    let records = Device::default().records(0..2_000, 3);
    let mut image = log_image(&records);
    // Smash the pair start of record 700
    image[700 * RECORD_LEN + 4] = 0x55;

    let contents = LogReader::new(image.as_slice()).collect_contents().unwrap();
    assert_eq!(contents.records.len(), 1_999);
    assert!(contents.framing.resyncs >= 1);

    let result = reconstruct(&contents.records, &ReconstructParams::default()).unwrap();
    assert_eq!(result.lost_samples, 1);
    assert_eq!(result.samples[700].index, 701);
}

/// Logs written across several sessions append to one file
#[test]
fn test_append_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("append.bci");
    let records = Device::default().records(0..20, 4);

    for chunk in records.chunks(10) {
        let mut writer = LogWriter::create(&path).unwrap();
        for record in chunk {
            writer
                .append(record.capture_timestamp_ms, &record.pair.to_bytes())
                .unwrap();
        }
        writer.flush().unwrap();
    }

    let contents = read_log(&path).unwrap();
    assert_eq!(contents.records, records);
}

#[test]
fn test_log_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("run.bci");
    let csv_path = dir.path().join("run.csv");

    let records = Device::default().records(0..1_000, 5);
    std::fs::File::create(&log_path)
        .unwrap()
        .write_all(&log_image(&records))
        .unwrap();

    let contents = read_log(&log_path).unwrap();
    let result = reconstruct(&contents.records, &ReconstructParams::default()).unwrap();
    export_csv(&result, &csv_path, false).unwrap();

    let text = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1_000);

    let fields: Vec<&str> = lines[10].split(',').collect();
    assert_eq!(fields.len(), 17);
    let time: f64 = fields[0].parse().unwrap();
    assert!((time - result.samples[10].system_time_s).abs() < 1e-6);
    let channels: Vec<i32> = fields[1..].iter().map(|f| f.parse().unwrap()).collect();
    assert_eq!(channels, channels_for(10).to_vec());

    // Six decimals: sub-millisecond precision
    assert_eq!(fields[0].split('.').nth(1).map(str::len), Some(6));
}

#[test]
fn test_log_to_segmented_csv() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("split.csv");

    let indices: Vec<i64> = (0..400).chain(450..900).chain(905..1_000).collect();
    let records = Device::default().records(indices, 6);
    let result = reconstruct(&records, &ReconstructParams::default()).unwrap();

    let paths = export_segments(&result, &base, true).unwrap();
    assert_eq!(paths.len(), 3);

    let lengths: Vec<usize> = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap().lines().count() - 1)
        .collect();
    assert_eq!(lengths, vec![400, 450, 95]);
}

/// A log the live logger wrote with a retransmitted pair still reconstructs
#[test]
fn test_logged_duplicate_reconstructs() {
    let bytes = wire_stream(0, 600);
    let mut logger = LiveLogger::new(LogWriter::new(Vec::new()), DuplicatePolicy::default());

    for (i, pair) in bytes.chunks(PAIR_LEN).enumerate() {
        let capture_ms = 100 + 4 * i as u32;
        logger.ingest(pair, capture_ms).unwrap();
        if i == 300 {
            let summary = logger.ingest(pair, capture_ms + 1).unwrap();
            assert_eq!((summary.duplicates, summary.written), (1, 1));
        }
    }
    let image = logger.into_writer().into_inner().unwrap();

    let contents = parse_log(&image);
    assert_eq!(contents.records.len(), 601);

    let result = reconstruct(&contents.records, &ReconstructParams::default()).unwrap();
    assert_eq!(result.samples.len(), 600);
    assert_eq!(result.duplicates_skipped, 1);
    assert_eq!(result.lost_samples, 0);
    assert_eq!(result.samples[301].index, 301);
}
