//! One capture session from board check to stream stop

use super::device::{local_ip_for, DeviceControl};
use super::logger::{LiveLogger, LoggerSettings};
use super::{transport, CaptureError};
use crate::config::CaptureConfig;
use crate::log::LogWriter;
use crate::stats::CaptureSummary;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Run a capture session writing to `log_path`
///
/// The board is checked and configured before anything is bound or opened.
/// Once the stream has been started it is always stopped again, whatever
/// ends the session.
pub fn run_capture(
    device: &dyn DeviceControl,
    config: &CaptureConfig,
    log_path: &Path,
    shutdown: &AtomicBool,
) -> Result<CaptureSummary, CaptureError> {
    device.query_board_info()?.ensure_supported()?;
    for command in &config.startup_commands {
        device.send_command(command)?;
    }

    let writer = LogWriter::create(log_path)?;
    let mut transport = transport::bind(config.transport, config.bind_port, config.recv_buffer_bytes)?;
    let local_ip = local_ip_for(&config.device_host)?;
    let target = SocketAddr::new(local_ip, transport.local_addr()?.port());
    tracing::info!(%target, transport = config.transport.endpoint(), "Listening for stream");

    device.start_stream(target, config.latency_us)?;

    let mut logger = LiveLogger::new(writer, config.duplicate_policy);
    let result = logger.run(transport.as_mut(), &LoggerSettings::from(config), shutdown);

    if let Err(e) = device.stop_stream() {
        tracing::warn!(error = %e, "Failed to stop stream");
    }

    let summary = logger.summary();
    tracing::info!(
        pairs = summary.pairs_received,
        written = summary.records_written,
        dropped = summary.dropped_samples,
        duplicates = summary.duplicates,
        framing_errors = summary.framing_errors,
        discarded_bytes = summary.discarded_bytes,
        "Capture finished"
    );

    result.map(|_| summary)
}
