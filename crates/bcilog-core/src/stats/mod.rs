//! Capture statistics
//!
//! - Session counters and the recent loss timeline ([`store`])
//! - Periodic samples-per-second reporting ([`throughput`])

pub mod store;
pub mod throughput;

pub use store::{CaptureStats, CaptureSummary, LossEvent};
pub use throughput::ThroughputMeter;
