//! Registry of serial ports discovered on this machine

use crate::error::{ErrorContext, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Refreshable `device -> description` table of serial ports.
///
/// Nothing in the test core consults this implicitly; port selection code
/// holds a registry and refreshes it when it wants a current view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortRegistry {
    ports: BTreeMap<String, String>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate serial ports and replace the table
    pub fn refresh(&mut self) -> Result<&BTreeMap<String, String>> {
        let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
        self.ports = ports.into_iter()
            .map(|info| {
                let description = describe(&info);
                (info.port_name, description)
            })
            .collect();
        Ok(&self.ports)
    }

    /// Build a registry and refresh it once
    pub fn discover() -> Result<Self> {
        let mut registry = Self::new();
        registry.refresh()?;
        Ok(registry)
    }

    pub fn ports(&self) -> &BTreeMap<String, String> {
        &self.ports
    }

    pub fn contains(&self, device: &str) -> bool {
        self.ports.contains_key(device)
    }

    pub fn description(&self, device: &str) -> Option<&str> {
        self.ports.get(device).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Insert an entry directly
    pub fn insert(&mut self, device: impl Into<String>, description: impl Into<String>) {
        self.ports.insert(device.into(), description.into());
    }
}

fn describe(info: &serialport::SerialPortInfo) -> String {
    let name = info.port_name.rsplit('/').next().unwrap_or(&info.port_name).to_string();
    match &info.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let vendor = usb.manufacturer.clone()
                .or_else(|| usb.product.clone())
                .unwrap_or_else(|| format!("{:04x}:{:04x}", usb.vid, usb.pid));
            format!("{} ({})", name, vendor)
        }
        serialport::SerialPortType::BluetoothPort => format!("{} (bluetooth)", name),
        serialport::SerialPortType::PciPort => format!("{} (pci)", name),
        serialport::SerialPortType::Unknown => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_entries() {
        let mut registry = PortRegistry::new();
        assert!(registry.is_empty());

        registry.insert("/dev/ttyUSB0", "ttyUSB0 (FTDI)");
        assert!(registry.contains("/dev/ttyUSB0"));
        assert_eq!(registry.description("/dev/ttyUSB0"), Some("ttyUSB0 (FTDI)"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_describe_port_types() {
        let info = serialport::SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: serialport::SerialPortType::PciPort,
        };
        assert_eq!(describe(&info), "ttyS0 (pci)");

        let info = serialport::SerialPortInfo {
            port_name: "COM3".to_string(),
            port_type: serialport::SerialPortType::Unknown,
        };
        assert_eq!(describe(&info), "COM3");
    }

    #[test]
    fn test_refresh_does_not_panic() {
        // Enumeration may fail in sandboxes without a device tree
        let mut registry = PortRegistry::new();
        let _ = registry.refresh();
    }
}
