//! Capture session configuration

use serde::{Deserialize, Serialize};

/// Default requested device-side latency in microseconds
pub const DEFAULT_LATENCY_US: u32 = 10_000;

/// Default silence window before a session is abandoned
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 5_000;

/// Default socket receive buffer size
pub const DEFAULT_RECV_BUFFER_BYTES: usize = 1024 * 1024;

/// Live transport carrying the stream from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Datagrams sent to our bound port
    #[default]
    Udp,
    /// The device connects to our listening port
    Tcp,
}

impl TransportKind {
    /// Path segment of the device's stream-target endpoint
    pub fn endpoint(self) -> &'static str {
        match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
        }
    }
}

/// What the live logger does with a repeated sample number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Persist silently
    Accept,
    /// Persist and log a warning
    #[default]
    Flag,
    /// Do not persist
    Drop,
}

fn default_device_host() -> String {
    "192.168.4.1".to_string()
}

fn default_latency_us() -> u32 {
    DEFAULT_LATENCY_US
}

fn default_silence_timeout_ms() -> u64 {
    DEFAULT_SILENCE_TIMEOUT_MS
}

fn default_recv_buffer_bytes() -> usize {
    DEFAULT_RECV_BUFFER_BYTES
}

fn default_report_interval_ms() -> u64 {
    1_000
}

fn default_startup_commands() -> Vec<String> {
    ["~0", "/4", "<"].iter().map(|c| c.to_string()).collect()
}

/// Settings of one capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Host name or address of the device's HTTP interface
    #[serde(default = "default_device_host")]
    pub device_host: String,
    /// Stream transport
    #[serde(default)]
    pub transport: TransportKind,
    /// Local port to bind (0 = ephemeral)
    #[serde(default)]
    pub bind_port: u16,
    /// Requested device-side buffering latency (µs)
    #[serde(default = "default_latency_us")]
    pub latency_us: u32,
    /// Silence window before the session fails (ms)
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
    /// Socket receive buffer size
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
    /// Throughput report interval (ms)
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// Board commands sent before streaming starts
    #[serde(default = "default_startup_commands")]
    pub startup_commands: Vec<String>,
    /// Handling of repeated sample numbers
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_host: default_device_host(),
            transport: TransportKind::default(),
            bind_port: 0,
            latency_us: default_latency_us(),
            silence_timeout_ms: default_silence_timeout_ms(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
            report_interval_ms: default_report_interval_ms(),
            startup_commands: default_startup_commands(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}
