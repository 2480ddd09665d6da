//! Byte transports the echo trials run over
//!
//! A physical serial line and a TCP raw-socket substitute both implement
//! [`TransportPort`]. [`open`] builds the right one from a
//! [`TransportConfig`], and [`echo_exchange`] runs the write-then-poll-read
//! protocol every trial uses.

pub mod serial;
pub mod tcp;

pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use crate::{
    error::{AppError, Result},
    models::TransportConfig,
};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Uniform byte-oriented transport capability
pub trait TransportPort: Send {
    /// Write the whole buffer, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read up to `max_size` bytes. Blocks up to the transport's own read
    /// timeout and returns an empty buffer if nothing arrived in time.
    fn read(&mut self, max_size: usize) -> Result<Vec<u8>>;

    /// Release the underlying handle. Further writes and reads fail.
    fn close(&mut self) -> Result<()>;

    /// Human-readable name of the link
    fn name(&self) -> String;

    /// Local endpoint, for socket-like transports
    fn local_address(&self) -> Option<String> {
        None
    }

    /// Remote endpoint, for socket-like transports
    fn peer_address(&self) -> Option<String> {
        None
    }
}

/// The concrete transport a session runs over
pub enum Transport {
    Serial(SerialTransport),
    TcpLoopback(TcpTransport),
}

impl Transport {
    pub fn is_serial(&self) -> bool {
        matches!(self, Transport::Serial(_))
    }
}

impl TransportPort for Transport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self {
            Transport::Serial(port) => port.write(data),
            Transport::TcpLoopback(port) => port.write(data),
        }
    }

    fn read(&mut self, max_size: usize) -> Result<Vec<u8>> {
        match self {
            Transport::Serial(port) => port.read(max_size),
            Transport::TcpLoopback(port) => port.read(max_size),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Transport::Serial(port) => port.close(),
            Transport::TcpLoopback(port) => port.close(),
        }
    }

    fn name(&self) -> String {
        match self {
            Transport::Serial(port) => port.name(),
            Transport::TcpLoopback(port) => port.name(),
        }
    }

    fn local_address(&self) -> Option<String> {
        match self {
            Transport::Serial(port) => port.local_address(),
            Transport::TcpLoopback(port) => port.local_address(),
        }
    }

    fn peer_address(&self) -> Option<String> {
        match self {
            Transport::Serial(port) => port.peer_address(),
            Transport::TcpLoopback(port) => port.peer_address(),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Serial(_) => write!(f, "Transport::Serial({})", self.name().trim()),
            Transport::TcpLoopback(_) => write!(f, "Transport::TcpLoopback({})", self.name().trim()),
        }
    }
}

/// Open the transport described by `config`. The returned handle is
/// already connected.
pub fn open(config: &TransportConfig) -> Result<Transport> {
    match config {
        TransportConfig::Serial(settings) => Ok(Transport::Serial(SerialTransport::open(settings)?)),
        TransportConfig::TcpLoopback(settings) => Ok(Transport::TcpLoopback(TcpTransport::connect(settings)?)),
    }
}

/// Transport handle shared between the caller and the worker running trials
pub type SharedPort = Arc<Mutex<Box<dyn TransportPort>>>;

/// Wrap a transport for use by a session
pub fn shared<T: TransportPort + 'static>(port: T) -> SharedPort {
    Arc::new(Mutex::new(Box::new(port)))
}

/// Lock a shared port, mapping a poisoned lock to an internal error
pub fn lock(port: &SharedPort) -> Result<MutexGuard<'_, Box<dyn TransportPort>>> {
    port.lock()
        .map_err(|_| AppError::internal("Transport lock poisoned by a panicked trial"))
}

/// Close a shared port
pub fn close_shared(port: &SharedPort) -> Result<()> {
    lock(port)?.close()
}

/// Result of one write/poll-read exchange
#[derive(Debug, Clone, PartialEq)]
pub struct EchoExchange {
    pub sent: Vec<u8>,
    pub received: Vec<u8>,
    pub elapsed: Duration,
}

impl EchoExchange {
    pub fn is_complete(&self) -> bool {
        self.sent == self.received
    }
}

/// Write `data` once, then keep reading until the echo matches or `timeout`
/// has elapsed.
///
/// The deadline is checked between reads only, so a slow blocking read can
/// push the exchange past `timeout` by up to one read timeout. A partial or
/// empty echo is a valid result, not an error.
pub fn echo_exchange(port: &mut dyn TransportPort, data: &[u8], timeout: Duration) -> Result<EchoExchange> {
    let start = Instant::now();
    let written = port.write(data)?;

    let mut received = Vec::with_capacity(data.len());
    while received != data && start.elapsed() < timeout {
        let chunk = port.read(written.max(1))?;
        received.extend_from_slice(&chunk);
    }

    Ok(EchoExchange {
        sent: data.to_vec(),
        received,
        elapsed: start.elapsed(),
    })
}

/// Check whether a TCP endpoint accepts connections within `timeout`.
///
/// Resolution failures are errors; a refused or timed-out connect is
/// reported as `Ok(false)`.
pub fn probe_host(host: &str, port: u16, timeout: Duration) -> Result<bool> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| AppError::transport(format!("Failed to resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| AppError::transport(format!("No address found for {}:{}", host, port)))?;

    Ok(TcpStream::connect_timeout(&addr, timeout).is_ok())
}

/// Format an endpoint the way transport names are displayed: host right
/// aligned to 16 columns, port left aligned to 6.
pub fn format_endpoint(host: impl std::fmt::Display, port: u16) -> String {
    format!("{:>16}:{:<6}", host.to_string(), port)
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenPort, EchoPort};
    use super::*;
    use crate::models::{Config, TcpSettings};

    #[test]
    fn test_echo_exchange_complete() {
        let mut port = EchoPort::new().chunked(3);
        let exchange = echo_exchange(&mut port, b"hello world", Duration::from_secs(1)).unwrap();
        assert!(exchange.is_complete());
        assert_eq!(exchange.received, b"hello world");
        assert_eq!(port.writes, 1);
    }

    #[test]
    fn test_echo_exchange_times_out_on_partial_echo() {
        let mut port = EchoPort::with_corruption(|data| data[..data.len() / 2].to_vec());
        let timeout = Duration::from_millis(30);
        let exchange = echo_exchange(&mut port, b"abcdef", timeout).unwrap();
        assert!(!exchange.is_complete());
        assert_eq!(exchange.received, b"abc");
        assert!(exchange.elapsed >= timeout);
    }

    #[test]
    fn test_echo_exchange_propagates_transport_errors() {
        let mut port = BrokenPort;
        let err = echo_exchange(&mut port, b"x", Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.category(), "TRANSPORT");
    }

    #[test]
    fn test_shared_port_close() {
        let port = shared(EchoPort::new());
        assert!(close_shared(&port).is_ok());
        assert_eq!(lock(&port).unwrap().name(), "echo");
    }

    #[test]
    fn test_endpoint_formatting() {
        assert_eq!(format_endpoint("127.0.0.1", 8080), "       127.0.0.1:8080  ");
    }

    #[test]
    fn test_open_fails_closed_without_transport() {
        assert!(Config::default().transport_config().and_then(|cfg| open(&cfg)).is_err());
    }

    #[test]
    fn test_open_tcp_refused() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let config = TransportConfig::TcpLoopback(TcpSettings {
            host: "127.0.0.1".to_string(),
            port,
            framing: Config::default().framing(),
            timeout: Duration::from_millis(200),
        });
        assert!(open(&config).is_err());
    }

    #[test]
    fn test_probe_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(probe_host("127.0.0.1", port, Duration::from_millis(500)).unwrap());
        drop(listener);
        assert!(!probe_host("127.0.0.1", port, Duration::from_millis(500)).unwrap());
    }
}
