//! Live stream transports
//!
//! Both transports are blocking with per-call timeouts so the logger loop
//! can poll a shutdown flag between waits.

use crate::config::TransportKind;
use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io::{self, ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep between accept attempts while no device is connected
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Outcome of one receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// `n` bytes were written to the front of the buffer
    Data(usize),
    /// Nothing arrived before the timeout
    TimedOut,
    /// The peer closed the stream
    Closed,
}

/// Byte source for the live logger
pub trait Transport {
    /// Wait up to `timeout` for the next chunk of stream bytes
    fn recv_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Received>;

    /// Address the device should send to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn read_timeout(timeout: Duration) -> Option<Duration> {
    // A zero read timeout means "block forever" to the OS
    Some(timeout.max(Duration::from_millis(1)))
}

/// Datagram transport; each datagram carries raw stream bytes
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind on all interfaces with an enlarged receive buffer
    pub fn bind(port: u16, recv_buffer_bytes: usize) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_bytes) {
            tracing::warn!(error = %e, requested = recv_buffer_bytes, "Failed to enlarge UDP receive buffer");
        }
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&SockAddr::from(addr))?;

        let socket: UdpSocket = socket.into();
        tracing::info!(addr = %socket.local_addr()?, "UDP transport bound");
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    fn recv_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Received> {
        self.socket.set_read_timeout(read_timeout(timeout))?;
        match self.socket.recv(buf) {
            Ok(n) => Ok(Received::Data(n)),
            Err(e) if is_timeout(&e) || e.kind() == ErrorKind::Interrupted => Ok(Received::TimedOut),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Stream transport; the device connects to our listener
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    stream: Option<TcpStream>,
    recv_buffer_bytes: usize,
}

impl TcpTransport {
    /// Listen on all interfaces
    pub fn bind(port: u16, recv_buffer_bytes: usize) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        listener.set_nonblocking(true)?;
        tracing::info!(addr = %listener.local_addr()?, "TCP transport listening");
        Ok(Self {
            listener,
            stream: None,
            recv_buffer_bytes,
        })
    }

    /// Poll for the device connection until `deadline`
    fn accept_until(&mut self, deadline: Instant) -> io::Result<bool> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    if let Err(e) = SockRef::from(&stream).set_recv_buffer_size(self.recv_buffer_bytes) {
                        tracing::warn!(error = %e, "Failed to enlarge TCP receive buffer");
                    }
                    tracing::info!(%peer, "Stream connection accepted");
                    self.stream = Some(stream);
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl Transport for TcpTransport {
    fn recv_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Received> {
        let deadline = Instant::now() + timeout;
        if self.stream.is_none() && !self.accept_until(deadline)? {
            return Ok(Received::TimedOut);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Received::TimedOut);
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        stream.set_read_timeout(read_timeout(remaining))?;
        match stream.read(buf) {
            Ok(0) => {
                tracing::info!("Stream connection closed by peer");
                self.stream = None;
                Ok(Received::Closed)
            }
            Ok(n) => Ok(Received::Data(n)),
            Err(e) if is_timeout(&e) || e.kind() == ErrorKind::Interrupted => Ok(Received::TimedOut),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Bind the transport selected by `kind`
pub fn bind(kind: TransportKind, port: u16, recv_buffer_bytes: usize) -> io::Result<Box<dyn Transport>> {
    Ok(match kind {
        TransportKind::Udp => Box::new(UdpTransport::bind(port, recv_buffer_bytes)?),
        TransportKind::Tcp => Box::new(TcpTransport::bind(port, recv_buffer_bytes)?),
    })
}
