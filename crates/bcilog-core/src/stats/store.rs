//! Session counters for the live logger
//!
//! Keeps running totals plus a bounded history of recent loss events with
//! wall-clock timestamps.

use crate::protocol::framer::FramerStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of loss events kept in history
const MAX_LOSS_EVENTS: usize = 1024;

/// A detected gap in the sample-number sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossEvent {
    /// When the gap was detected
    pub timestamp: DateTime<Utc>,
    /// Sample number that arrived after the gap
    pub sample_number: u8,
    /// Samples missing before it (modulo 256)
    pub count: u64,
}

/// End-of-session totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureSummary {
    /// Bytes received from the transport
    pub bytes_received: u64,
    /// Validated packet pairs
    pub pairs_received: u64,
    /// Records persisted to the log
    pub records_written: u64,
    /// Samples missing according to sample numbers
    pub dropped_samples: u64,
    /// Gaps seen
    pub loss_events: u64,
    /// Repeated sample numbers seen
    pub duplicates: u64,
    /// Repeated pairs not persisted
    pub duplicates_discarded: u64,
    /// Framer resynchronizations
    pub framing_errors: u64,
    /// Bytes skipped while resynchronizing
    pub discarded_bytes: u64,
    /// Session length in seconds
    pub duration_secs: f64,
}

/// Running statistics of one capture session
#[derive(Debug)]
pub struct CaptureStats {
    started_at: DateTime<Utc>,
    loss_history: VecDeque<LossEvent>,
    bytes_received: u64,
    pairs_received: u64,
    records_written: u64,
    dropped_samples: u64,
    loss_events: u64,
    duplicates: u64,
    duplicates_discarded: u64,
    framing: FramerStats,
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStats {
    /// Create an empty store stamped with the current time
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            loss_history: VecDeque::with_capacity(64),
            bytes_received: 0,
            pairs_received: 0,
            records_written: 0,
            dropped_samples: 0,
            loss_events: 0,
            duplicates: 0,
            duplicates_discarded: 0,
            framing: FramerStats::default(),
        }
    }

    /// Count bytes handed over by the transport
    pub fn record_bytes(&mut self, count: usize) {
        self.bytes_received += count as u64;
    }

    /// Count one validated pair and whether it was persisted
    pub fn record_pair(&mut self, written: bool) {
        self.pairs_received += 1;
        if written {
            self.records_written += 1;
        }
    }

    /// Record a gap before `sample_number`
    pub fn record_loss(&mut self, sample_number: u8, count: u64) {
        if self.loss_history.len() >= MAX_LOSS_EVENTS {
            self.loss_history.pop_front();
        }
        self.loss_history.push_back(LossEvent {
            timestamp: Utc::now(),
            sample_number,
            count,
        });
        self.loss_events += 1;
        self.dropped_samples += count;
    }

    /// Record a repeated sample number
    pub fn record_duplicate(&mut self, discarded: bool) {
        self.duplicates += 1;
        if discarded {
            self.duplicates_discarded += 1;
        }
    }

    /// Take the framer's latest counters
    pub fn update_framing(&mut self, framing: FramerStats) {
        self.framing = framing;
    }

    /// Recent loss events, oldest first
    pub fn loss_history(&self) -> &VecDeque<LossEvent> {
        &self.loss_history
    }

    /// Validated pairs so far
    pub fn pairs_received(&self) -> u64 {
        self.pairs_received
    }

    /// Samples missing so far
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }

    /// Session start
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot of the totals
    pub fn summary(&self) -> CaptureSummary {
        let elapsed = Utc::now() - self.started_at;
        CaptureSummary {
            bytes_received: self.bytes_received,
            pairs_received: self.pairs_received,
            records_written: self.records_written,
            dropped_samples: self.dropped_samples,
            loss_events: self.loss_events,
            duplicates: self.duplicates,
            duplicates_discarded: self.duplicates_discarded,
            framing_errors: self.framing.resyncs,
            discarded_bytes: self.framing.discarded_bytes,
            duration_secs: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let stats = CaptureStats::new();
        assert_eq!(stats.pairs_received(), 0);
        assert!(stats.loss_history().is_empty());
        assert_eq!(stats.summary().records_written, 0);
    }

    #[test]
    fn test_record_loss() {
        let mut stats = CaptureStats::new();
        stats.record_loss(12, 10);
        stats.record_loss(40, 5);
        assert_eq!(stats.dropped_samples(), 15);
        assert_eq!(stats.summary().loss_events, 2);
        assert_eq!(stats.loss_history()[1].sample_number, 40);
    }

    #[test]
    fn test_loss_history_bounded() {
        let mut stats = CaptureStats::new();
        for i in 0..(MAX_LOSS_EVENTS + 10) {
            stats.record_loss((i % 256) as u8, 1);
        }
        assert_eq!(stats.loss_history().len(), MAX_LOSS_EVENTS);
        assert_eq!(stats.dropped_samples(), (MAX_LOSS_EVENTS + 10) as u64);
    }

    #[test]
    fn test_duplicates_and_pairs() {
        let mut stats = CaptureStats::new();
        stats.record_pair(true);
        stats.record_pair(false);
        stats.record_duplicate(true);
        stats.update_framing(FramerStats {
            frames: 2,
            resyncs: 3,
            discarded_bytes: 70,
        });

        let summary = stats.summary();
        assert_eq!(summary.pairs_received, 2);
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.duplicates_discarded, 1);
        assert_eq!(summary.framing_errors, 3);
        assert_eq!(summary.discarded_bytes, 70);
    }
}
