//! Live capture
//!
//! This module contains everything that runs while the device streams:
//! - Board control over HTTP ([`device`])
//! - UDP/TCP stream receivers ([`transport`])
//! - Sample-number continuity tracking ([`loss`])
//! - The framing and logging loop ([`logger`])
//! - Session orchestration ([`session`])

pub mod device;
pub mod logger;
pub mod loss;
pub mod session;
pub mod transport;

use crate::log::LogError;
use thiserror::Error;

pub use device::{local_ip_for, BoardInfo, DeviceControl, DeviceError, HttpDevice};
pub use logger::{CaptureState, ChunkSummary, LiveLogger, LoggerSettings};
pub use loss::{LossTracker, SampleEvent};
pub use session::run_capture;
pub use transport::{Received, TcpTransport, Transport, UdpTransport};

/// Errors that end a capture session
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No data received for {timeout_ms} ms")]
    Silence { timeout_ms: u64 },

    #[error("Stream connection closed by the device")]
    TransportClosed,

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
