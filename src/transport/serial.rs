//! Physical serial line transport

use super::TransportPort;
use crate::{
    error::{AppError, Result},
    models::{Framing, SerialSettings},
    types::{DataBits, Parity, StopBits},
};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Thin pass-through to a framing-configured serial line
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
    path: String,
    framing: Framing,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open the line described by `settings`
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.framing.baudrate)
            .data_bits(data_bits(settings.framing.data_bits))
            .parity(parity(settings.framing.parity))
            .stop_bits(stop_bits(settings.framing.stop_bits)?)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| AppError::transport(format!("Failed to open serial port {}: {}", settings.port, e)))?;

        Ok(Self {
            port: Some(port),
            path: settings.port.clone(),
            framing: settings.framing,
            read_timeout: settings.read_timeout,
        })
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        let path = &self.path;
        self.port.as_mut()
            .ok_or_else(|| AppError::transport(format!("Serial port {} is closed", path)))
    }
}

impl TransportPort for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port_mut()?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| AppError::transport(format!("Serial write failed: {}", e)))?;
        Ok(data.len())
    }

    fn read(&mut self, max_size: usize) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let mut buffer = vec![0u8; max_size.max(1)];
        match port.read(&mut buffer) {
            Ok(count) => {
                buffer.truncate(count);
                Ok(buffer)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(Vec::new()),
            Err(e) => Err(AppError::transport(format!("Serial read failed: {}", e))),
        }
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle releases the device
        self.port.take();
        Ok(())
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn stop_bits(bits: StopBits) -> Result<serialport::StopBits> {
    match bits {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => Err(AppError::config("1.5 stop bits are not supported on serial ports")),
    }
}
