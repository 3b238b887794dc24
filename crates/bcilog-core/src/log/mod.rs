//! On-disk capture log
//!
//! ## File Format
//!
//! Records are packed back-to-back with no file header or footer. Each
//! record is 70 bytes: `[u32_be capture_ms][66-byte packet pair]`, where
//! `capture_ms` counts milliseconds since the capture session started.
//!
//! Record boundaries are only trusted after the embedded pair validates;
//! the reader runs the same framer as the live path.

pub mod reader;
pub mod writer;

use crate::protocol::codec::PacketPair;
use thiserror::Error;

pub use reader::{parse_log, read_log, LogContents, LogReader};
pub use writer::LogWriter;

/// Errors raised while reading or writing a log
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open log {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One persisted record: capture timestamp plus the decoded pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    /// Capture clock in milliseconds since session start
    pub capture_timestamp_ms: u32,
    /// The validated packet pair
    pub pair: PacketPair,
}
