//! Append-only log writer

use super::LogError;
use crate::protocol::schema::{PAIR_LEN, RECORD_LEN};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `[u32_be capture_ms][pair]` records
///
/// Records are buffered; call [`LogWriter::flush`] after each received chunk
/// so what was accepted is on disk before the next wait.
pub struct LogWriter<W: Write> {
    inner: BufWriter<W>,
    records_written: u64,
}

impl LogWriter<File> {
    /// Open `path` for appending, creating it if needed
    pub fn create(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogError::Open {
                path: path.display().to_string(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Opened capture log");
        Ok(Self::new(file))
    }
}

impl<W: Write> LogWriter<W> {
    /// Wrap any byte sink
    pub fn new(sink: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(64 * RECORD_LEN, sink),
            records_written: 0,
        }
    }

    /// Append one record
    pub fn append(&mut self, capture_timestamp_ms: u32, pair: &[u8; PAIR_LEN]) -> Result<(), LogError> {
        self.inner.write_all(&capture_timestamp_ms.to_be_bytes())?;
        self.inner.write_all(pair)?;
        self.records_written += 1;
        Ok(())
    }

    /// Push buffered records to the underlying sink
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Records appended since creation
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush and return the underlying sink
    pub fn into_inner(self) -> Result<W, LogError> {
        self.inner
            .into_inner()
            .map_err(|e| LogError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::PacketPair;
    use crate::protocol::schema::CHANNELS;

    #[test]
    fn test_record_layout() {
        let pair = PacketPair::new(9, 77, [0; CHANNELS]).to_bytes();
        let mut writer = LogWriter::new(Vec::new());
        writer.append(0x0102_0304, &pair).unwrap();
        assert_eq!(writer.records_written(), 1);

        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(&bytes[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[4..], &pair[..]);
    }

    #[test]
    fn test_create_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bci");
        let pair = PacketPair::new(1, 1, [0; CHANNELS]).to_bytes();

        for _ in 0..2 {
            let mut writer = LogWriter::create(&path).unwrap();
            writer.append(5, &pair).unwrap();
            writer.flush().unwrap();
        }

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 2 * RECORD_LEN as u64);
    }
}
