//! bcilog - Capture and time-base reconstruction for 16-channel bioelectric telemetry
//!
//! This library re-exports the framing, logging, capture and reconstruction
//! functionality from `bcilog-core` and adds the persisted application
//! configuration used by the command line tool.

pub mod config;

pub use bcilog_core::{capture, export, log, protocol, reconstruct, stats};

pub use bcilog_core::{
    read_log, run_capture, CaptureConfig, CaptureError, CaptureStats,
    DeviceControl, DuplicatePolicy, FrameError, HttpDevice, LiveLogger, LogReader, LogRecord, LogWriter,
    PacketPair, ReconstructError, ReconstructParams, Reconstruction, StreamFramer, TransportKind, VERSION,
};
