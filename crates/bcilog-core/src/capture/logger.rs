//! Live framing and logging loop

use super::loss::{LossTracker, SampleEvent};
use super::transport::{Received, Transport};
use super::CaptureError;
use crate::config::{CaptureConfig, DuplicatePolicy};
use crate::log::{LogError, LogWriter};
use crate::protocol::framer::StreamFramer;
use crate::protocol::schema::{FrameLayout, SAMPLE_NUMBER_OFFSET};
use crate::stats::{CaptureStats, CaptureSummary, ThroughputMeter};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Receive buffer size per transport call
const RECV_CHUNK: usize = 64 * 1024;

/// Longest single wait, so shutdown requests are noticed promptly
const POLL_SLICE: Duration = Duration::from_millis(250);

/// Loop timing and duplicate handling
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerSettings {
    /// Silence window before the session fails
    pub silence_timeout: Duration,
    /// Throughput report interval
    pub report_interval: Duration,
    /// Handling of repeated sample numbers
    pub duplicate_policy: DuplicatePolicy,
    /// Longest single transport wait
    pub poll_slice: Duration,
}

impl From<&CaptureConfig> for LoggerSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            silence_timeout: Duration::from_millis(config.silence_timeout_ms),
            report_interval: Duration::from_millis(config.report_interval_ms),
            duplicate_policy: config.duplicate_policy,
            poll_slice: POLL_SLICE,
        }
    }
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// Connection-level state of the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Frames are aligned; waiting for more bytes
    AwaitingData,
    /// Skipping junk until the next valid pair
    Junk,
}

/// What one received chunk produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    /// Validated pairs
    pub pairs: usize,
    /// Records persisted
    pub written: usize,
    /// Repeated sample numbers
    pub duplicates: usize,
    /// Samples missing according to sample numbers
    pub dropped_samples: u64,
    /// Resynchronizations triggered
    pub resyncs: u64,
}

/// Frames the live byte stream and persists every accepted pair
///
/// Records are flushed once per chunk so accepted data is on disk before
/// the next wait.
pub struct LiveLogger<W: Write> {
    framer: StreamFramer,
    writer: LogWriter<W>,
    tracker: LossTracker,
    stats: CaptureStats,
    policy: DuplicatePolicy,
    started: Instant,
}

impl<W: Write> LiveLogger<W> {
    /// Create a logger writing to `writer`
    pub fn new(writer: LogWriter<W>, policy: DuplicatePolicy) -> Self {
        Self {
            framer: StreamFramer::new(FrameLayout::Wire),
            writer,
            tracker: LossTracker::new(),
            stats: CaptureStats::new(),
            policy,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the logger was created, wrapping at 2^32
    pub fn capture_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    /// Frame, check and persist one chunk of stream bytes
    pub fn ingest(&mut self, chunk: &[u8], capture_ms: u32) -> Result<ChunkSummary, LogError> {
        let mut summary = ChunkSummary::default();
        let resyncs_before = self.framer.stats().resyncs;

        self.stats.record_bytes(chunk.len());
        self.framer.push(chunk);

        while let Some(frame) = self.framer.next_frame() {
            let sample_number = frame.raw[SAMPLE_NUMBER_OFFSET];
            summary.pairs += 1;

            let mut persist = true;
            match self.tracker.observe(sample_number) {
                SampleEvent::First | SampleEvent::Expected => {}
                SampleEvent::Dropped { count } => {
                    tracing::warn!(sample_number, dropped = count, "Dropped samples");
                    self.stats.record_loss(sample_number, count as u64);
                    summary.dropped_samples += count as u64;
                }
                SampleEvent::Duplicate => {
                    summary.duplicates += 1;
                    match self.policy {
                        DuplicatePolicy::Accept => {}
                        DuplicatePolicy::Flag => {
                            tracing::warn!(sample_number, "Duplicate sample number");
                        }
                        DuplicatePolicy::Drop => {
                            tracing::debug!(sample_number, "Discarding duplicate sample");
                            persist = false;
                        }
                    }
                    self.stats.record_duplicate(!persist);
                }
            }

            if persist {
                self.writer.append(capture_ms, &frame.raw)?;
                summary.written += 1;
            }
            self.stats.record_pair(persist);
        }

        self.writer.flush()?;
        let framing = self.framer.stats();
        summary.resyncs = framing.resyncs - resyncs_before;
        self.stats.update_framing(framing);
        Ok(summary)
    }

    /// Receive and log until shutdown, silence or a closed stream
    pub fn run(
        &mut self,
        transport: &mut dyn Transport,
        settings: &LoggerSettings,
        shutdown: &AtomicBool,
    ) -> Result<CaptureSummary, CaptureError> {
        let mut buf = vec![0u8; RECV_CHUNK];
        let mut last_data = Instant::now();
        let mut meter = ThroughputMeter::new(settings.report_interval, last_data);

        tracing::info!(
            silence_timeout_ms = settings.silence_timeout.as_millis() as u64,
            policy = ?settings.duplicate_policy,
            "Logging started"
        );

        while !shutdown.load(Ordering::Relaxed) {
            let silent_for = last_data.elapsed();
            if silent_for >= settings.silence_timeout {
                tracing::error!(silent_ms = silent_for.as_millis() as u64, "Stream went silent");
                return Err(CaptureError::Silence {
                    timeout_ms: settings.silence_timeout.as_millis() as u64,
                });
            }
            let wait = settings.poll_slice.min(settings.silence_timeout - silent_for);

            let pairs = match transport.recv_chunk(&mut buf, wait)? {
                Received::Data(0) | Received::TimedOut => 0,
                Received::Data(n) => {
                    last_data = Instant::now();
                    let capture_ms = self.capture_ms();
                    self.ingest(&buf[..n], capture_ms)?.pairs
                }
                Received::Closed => return Err(CaptureError::TransportClosed),
            };

            if let Some(rate) = meter.record(pairs as u64, Instant::now()) {
                tracing::info!(
                    samples_per_sec = %format!("{:.1}", rate),
                    total = self.stats.pairs_received(),
                    dropped = self.stats.dropped_samples(),
                    "Throughput"
                );
            }
        }

        tracing::info!("Shutdown requested, stopping capture");
        Ok(self.summary())
    }

    /// Whether the framer is currently skipping junk
    pub fn state(&self) -> CaptureState {
        if self.framer.is_resynchronizing() {
            CaptureState::Junk
        } else {
            CaptureState::AwaitingData
        }
    }

    /// Session counters
    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Snapshot of the session totals
    pub fn summary(&self) -> CaptureSummary {
        let mut summary = self.stats.summary();
        summary.records_written = self.writer.records_written();
        summary
    }

    /// Give back the log writer
    pub fn into_writer(self) -> LogWriter<W> {
        self.writer
    }
}
