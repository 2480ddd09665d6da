//! TCP raw-socket transport standing in for a serial line

use super::{format_endpoint, TransportPort};
use crate::{
    error::{AppError, Result},
    models::{Framing, TcpSettings},
};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// TCP client socket connected to an echo endpoint
pub struct TcpTransport {
    stream: Option<TcpStream>,
    target: SocketAddr,
    local: Option<SocketAddr>,
    peer: Option<SocketAddr>,
    framing: Framing,
    timeout: Duration,
}

impl TcpTransport {
    /// Resolve `settings.host` and connect within `settings.timeout`. The
    /// same timeout bounds every read and write on the socket.
    pub fn connect(settings: &TcpSettings) -> Result<Self> {
        let target = (settings.host.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| AppError::transport(format!("Failed to resolve {}:{}: {}", settings.host, settings.port, e)))?
            .next()
            .ok_or_else(|| AppError::transport(format!("No address found for {}:{}", settings.host, settings.port)))?;

        let stream = TcpStream::connect_timeout(&target, settings.timeout).map_err(|e| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                AppError::timeout(format!("Connecting to {} timed out after {:?}", target, settings.timeout))
            }
            _ => AppError::transport(format!("Failed to connect to {}: {}", target, e)),
        })?;

        stream.set_read_timeout(Some(settings.timeout))?;
        stream.set_write_timeout(Some(settings.timeout))?;
        stream.set_nodelay(true)?;

        let local = stream.local_addr().ok();
        let peer = stream.peer_addr().ok();

        Ok(Self {
            stream: Some(stream),
            target,
            local,
            peer,
            framing: settings.framing,
            timeout: settings.timeout,
        })
    }

    /// Serial framing used for bit accounting over this socket
    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        let target = self.target;
        self.stream.as_mut()
            .ok_or_else(|| AppError::transport(format!("Socket to {} is closed", target)))
    }
}

impl TransportPort for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.stream_mut()?
            .write_all(data)
            .map_err(|e| AppError::transport(format!("Socket write failed: {}", e)))?;
        Ok(data.len())
    }

    fn read(&mut self, max_size: usize) -> Result<Vec<u8>> {
        let stream = self.stream_mut()?;
        let mut buffer = vec![0u8; max_size.max(1)];
        match stream.read(&mut buffer) {
            Ok(0) => Err(AppError::transport("Connection closed by peer")),
            Ok(count) => {
                buffer.truncate(count);
                Ok(buffer)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(Vec::new()),
            Err(e) => Err(AppError::transport(format!("Socket read failed: {}", e))),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.local = None;
        self.peer = None;
        Ok(())
    }

    fn name(&self) -> String {
        format_endpoint(self.target.ip(), self.target.port())
    }

    fn local_address(&self) -> Option<String> {
        self.local.map(|addr| format_endpoint(addr.ip(), addr.port()))
    }

    fn peer_address(&self) -> Option<String> {
        self.peer.map(|addr| format_endpoint(addr.ip(), addr.port()))
    }
}
