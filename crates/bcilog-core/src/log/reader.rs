//! Log reading through the shared framer

use super::{LogError, LogRecord};
use crate::protocol::framer::{Frame, FramerStats, StreamFramer};
use crate::protocol::schema::FrameLayout;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read chunk size for streaming log reads
const READ_CHUNK: usize = 64 * 1024;

/// Everything recovered from a log
#[derive(Debug, Clone, Default)]
pub struct LogContents {
    /// Validated records in file order
    pub records: Vec<LogRecord>,
    /// Framing counters (resyncs indicate corruption inside the file)
    pub framing: FramerStats,
    /// Bytes left over at end of file that do not form a full record
    pub trailing_bytes: usize,
}

fn to_record(frame: Frame) -> LogRecord {
    LogRecord {
        capture_timestamp_ms: frame.capture_timestamp.unwrap_or(0),
        pair: frame.decode(),
    }
}

/// Streaming record reader over any byte source
///
/// Yields records lazily; I/O errors are yielded once and end the iteration.
pub struct LogReader<R: Read> {
    source: R,
    framer: StreamFramer,
    chunk: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> LogReader<R> {
    /// Wrap a byte source
    pub fn new(source: R) -> Self {
        Self {
            source,
            framer: StreamFramer::new(FrameLayout::LogRecord),
            chunk: vec![0u8; READ_CHUNK],
            exhausted: false,
        }
    }

    /// Framing counters so far
    pub fn framing(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Bytes buffered but not yet forming a record
    pub fn pending_len(&self) -> usize {
        self.framer.pending_len()
    }

    /// Drain the reader into a [`LogContents`]
    pub fn collect_contents(mut self) -> Result<LogContents, LogError> {
        let mut records = Vec::new();
        for record in self.by_ref() {
            records.push(record?);
        }

        let trailing_bytes = self.framer.pending_len();
        if trailing_bytes > 0 {
            tracing::debug!(trailing_bytes, "Ignoring partial record at end of log");
        }

        Ok(LogContents {
            records,
            framing: self.framer.stats(),
            trailing_bytes,
        })
    }
}

impl LogReader<File> {
    /// Open a log file read-only
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let file = File::open(path).map_err(|source| LogError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<LogRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.framer.next_frame() {
                return Some(Ok(to_record(frame)));
            }
            if self.exhausted {
                return None;
            }

            match self.source.read(&mut self.chunk) {
                Ok(0) => self.exhausted = true,
                Ok(n) => self.framer.push(&self.chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Parse an in-memory log image
pub fn parse_log(bytes: &[u8]) -> LogContents {
    let mut framer = StreamFramer::new(FrameLayout::LogRecord);
    framer.push(bytes);
    let records: Vec<LogRecord> = framer.frames().map(to_record).collect();

    let trailing_bytes = framer.pending_len();
    if trailing_bytes > 0 {
        tracing::debug!(trailing_bytes, "Ignoring partial record at end of log");
    }

    LogContents {
        records,
        framing: framer.stats(),
        trailing_bytes,
    }
}

/// Read and parse a whole log file
pub fn read_log(path: &Path) -> Result<LogContents, LogError> {
    let contents = LogReader::open(path)?.collect_contents()?;
    tracing::info!(
        path = %path.display(),
        records = contents.records.len(),
        resyncs = contents.framing.resyncs,
        discarded_bytes = contents.framing.discarded_bytes,
        "Loaded log"
    );
    Ok(contents)
}
