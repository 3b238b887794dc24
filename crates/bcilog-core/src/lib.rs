//! bcilog core - Packet framing, logging and time-base reconstruction
//!
//! This library receives the 16-channel packet stream of a bioelectric
//! acquisition board, persists every validated packet pair with a capture
//! timestamp, and later rebuilds a uniform, drift-corrected time base from
//! the 8-bit sample counter and the board's millisecond clock.

pub mod capture;
pub mod config;
pub mod export;
pub mod log;
pub mod protocol;
pub mod reconstruct;
pub mod stats;

pub use capture::{run_capture, CaptureError, DeviceControl, HttpDevice, LiveLogger};
pub use config::{CaptureConfig, DuplicatePolicy, TransportKind};
pub use log::{read_log, LogReader, LogRecord, LogWriter};
pub use protocol::codec::{FrameError, PacketPair};
pub use protocol::framer::StreamFramer;
pub use reconstruct::{reconstruct, ReconstructError, ReconstructParams, Reconstruction};
pub use stats::store::CaptureStats;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
