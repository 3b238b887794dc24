//! Device control over the board's HTTP interface

use crate::config::TransportKind;
use crate::protocol::schema::CHANNELS;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to every control request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Board variant that carries 16 channels
pub const SUPPORTED_VARIANT: &str = "daisy";

/// Device control errors; all of them abort capture startup
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{method} /{path} failed with status {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Device request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No board attached to the device")]
    BoardNotConnected,

    #[error(
        "Unsupported board {variant:?} with {channel_count} channels (need {need:?} with {need_channels})",
        need = SUPPORTED_VARIANT,
        need_channels = CHANNELS
    )]
    UnsupportedBoard { variant: String, channel_count: u32 },

    #[error("Cannot determine local address toward {host}: {source}")]
    LocalAddress {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// Board description reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    #[serde(rename = "board_connected")]
    pub connected: bool,
    #[serde(rename = "board_type", default)]
    pub variant: String,
    #[serde(rename = "num_channels", default)]
    pub channel_count: u32,
}

impl BoardInfo {
    /// Refuse anything but a connected 16-channel board
    pub fn ensure_supported(&self) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::BoardNotConnected);
        }
        if self.variant != SUPPORTED_VARIANT || self.channel_count != CHANNELS as u32 {
            return Err(DeviceError::UnsupportedBoard {
                variant: self.variant.clone(),
                channel_count: self.channel_count,
            });
        }
        Ok(())
    }
}

/// Control surface of the streaming device
pub trait DeviceControl {
    /// Send a board command string
    fn send_command(&self, command: &str) -> Result<(), DeviceError>;

    /// Point the stream at `target` and start it
    fn start_stream(&self, target: SocketAddr, latency_us: u32) -> Result<(), DeviceError>;

    /// Stop streaming
    fn stop_stream(&self) -> Result<(), DeviceError>;

    /// Describe the attached board
    fn query_board_info(&self) -> Result<BoardInfo, DeviceError>;
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

#[derive(Serialize)]
struct StreamTargetRequest {
    ip: String,
    port: u16,
    output: &'static str,
    latency: u32,
}

/// [`DeviceControl`] over the device's JSON/HTTP API
#[derive(Debug, Clone)]
pub struct HttpDevice {
    client: Client,
    base_url: String,
    transport: TransportKind,
}

impl HttpDevice {
    /// Control the device at `host` (optionally `host:port`)
    pub fn new(host: &str, transport: TransportKind) -> Result<Self, DeviceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: format!("http://{host}"),
            transport,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn check(method: &'static str, path: &str, response: Response) -> Result<Response, DeviceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(DeviceError::Status {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn get(&self, path: &str) -> Result<Response, DeviceError> {
        tracing::debug!(path, "GET");
        let response = self.client.get(self.url(path)).send()?;
        Self::check("GET", path, response)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, DeviceError> {
        tracing::debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send()?;
        Self::check("POST", path, response)
    }
}

impl DeviceControl for HttpDevice {
    fn send_command(&self, command: &str) -> Result<(), DeviceError> {
        self.post("command", &CommandRequest { command })?;
        tracing::debug!(command, "Board command sent");
        Ok(())
    }

    fn start_stream(&self, target: SocketAddr, latency_us: u32) -> Result<(), DeviceError> {
        let request = StreamTargetRequest {
            ip: target.ip().to_string(),
            port: target.port(),
            output: "raw",
            latency: latency_us,
        };
        self.post(self.transport.endpoint(), &request)?;
        self.get("stream/start")?;
        tracing::info!(%target, latency_us, transport = self.transport.endpoint(), "Stream started");
        Ok(())
    }

    fn stop_stream(&self) -> Result<(), DeviceError> {
        self.get("stream/stop")?;
        tracing::info!("Stream stopped");
        Ok(())
    }

    fn query_board_info(&self) -> Result<BoardInfo, DeviceError> {
        let info: BoardInfo = self.get("board")?.json()?;
        tracing::info!(
            connected = info.connected,
            variant = %info.variant,
            channels = info.channel_count,
            "Board info"
        );
        Ok(info)
    }
}

fn resolve(host: &str) -> io::Result<SocketAddr> {
    let mut addrs = match host.to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(_) => (host, 80).to_socket_addrs()?,
    };
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no IPv4 address"))
}

fn routed_local_ip(host: &str) -> io::Result<IpAddr> {
    let remote = resolve(host)?;
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.connect(remote)?;
    Ok(socket.local_addr()?.ip())
}

/// Local address the device can reach us on
///
/// Uses the interface the OS would route toward `host`, falling back to the
/// primary local address.
pub fn local_ip_for(host: &str) -> Result<IpAddr, DeviceError> {
    match routed_local_ip(host) {
        Ok(ip) if !ip.is_unspecified() => Ok(ip),
        Ok(_) | Err(_) => local_ip_address::local_ip().map_err(|e| DeviceError::LocalAddress {
            host: host.to_string(),
            source: io::Error::other(e.to_string()),
        }),
    }
}
