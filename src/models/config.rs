//! Configuration data model and validation

use crate::defaults;
use crate::types::{
    AppError, DataBits, DurationUnit, FrameMode, FrameStructure, Parity, PatternKind, Result, StopBits,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial device to test (e.g. `/dev/ttyUSB0`, `COM3`)
    #[serde(default)]
    pub serial_port: Option<String>,

    /// Echo server host for the TCP loopback substitute
    #[serde(default)]
    pub remote_host: Option<String>,

    /// Echo server port for the TCP loopback substitute
    #[serde(default)]
    pub remote_port: Option<u16>,

    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    #[serde(default)]
    pub data_bits: DataBits,

    #[serde(default)]
    pub parity: Parity,

    #[serde(default)]
    pub stop_bits: StopBits,

    /// Blocking read timeout of the serial driver, in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: f64,

    /// Connect and read timeout of the TCP socket, in seconds
    #[serde(default = "default_tcp_timeout")]
    pub tcp_timeout_secs: f64,

    /// Wall-clock limit of one echo exchange, in seconds
    #[serde(default = "default_data_timeout")]
    pub data_timeout_secs: f64,

    #[serde(default = "default_frame_min_limit")]
    pub frame_min_limit: usize,

    #[serde(default = "default_frame_max_limit")]
    pub frame_max_limit: usize,

    /// Payload length of fixed-mode trials and upper bound of random-mode trials
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,

    #[serde(default)]
    pub frame_mode: FrameMode,

    #[serde(default)]
    pub pattern: PatternKind,

    /// Target BER the confidence level is computed against
    #[serde(default = "default_desired_ber")]
    pub desired_ber: f64,

    /// Length of a timed run, in `duration_unit`
    #[serde(default = "default_test_duration")]
    pub test_duration: f64,

    #[serde(default)]
    pub duration_unit: DurationUnit,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Print the report as JSON
    #[serde(default)]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: None,
            remote_host: None,
            remote_port: None,
            baudrate: default_baudrate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            read_timeout_secs: default_read_timeout(),
            tcp_timeout_secs: default_tcp_timeout(),
            data_timeout_secs: default_data_timeout(),
            frame_min_limit: default_frame_min_limit(),
            frame_max_limit: default_frame_max_limit(),
            max_frame_length: default_max_frame_length(),
            frame_mode: FrameMode::default(),
            pattern: PatternKind::default(),
            desired_ber: default_desired_ber(),
            test_duration: default_test_duration(),
            duration_unit: DurationUnit::default(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            json: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_timeout(&self) -> Duration {
        secs_to_duration(self.read_timeout_secs)
    }

    pub fn tcp_timeout(&self) -> Duration {
        secs_to_duration(self.tcp_timeout_secs)
    }

    pub fn data_timeout(&self) -> Duration {
        secs_to_duration(self.data_timeout_secs)
    }

    /// Timed-run length with the duration unit applied
    pub fn test_duration(&self) -> Duration {
        self.duration_unit.to_duration(self.test_duration)
    }

    pub fn framing(&self) -> Framing {
        Framing {
            baudrate: self.baudrate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    pub fn frame_structure(&self) -> FrameStructure {
        self.framing().frame_structure()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.baudrate == 0 {
            return Err(AppError::config("Baud rate must be greater than 0"));
        }

        for (name, value) in [
            ("Read timeout", self.read_timeout_secs),
            ("TCP timeout", self.tcp_timeout_secs),
            ("Data timeout", self.data_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::config(format!("{} must be greater than 0 seconds, got: {}", name, value)));
            }
        }

        if self.frame_min_limit < 1 {
            return Err(AppError::config("Minimum frame length must be at least 1"));
        }

        if self.frame_max_limit > defaults::DEFAULT_FRAME_MAX_LIMIT {
            return Err(AppError::config(format!(
                "Maximum frame length cannot exceed {}, got: {}",
                defaults::DEFAULT_FRAME_MAX_LIMIT, self.frame_max_limit
            )));
        }

        if self.frame_min_limit > self.frame_max_limit {
            return Err(AppError::config(format!(
                "Minimum frame length ({}) cannot exceed maximum frame length ({})",
                self.frame_min_limit, self.frame_max_limit
            )));
        }

        if self.max_frame_length < self.frame_min_limit || self.max_frame_length > self.frame_max_limit {
            return Err(AppError::config(format!(
                "Frame length must be between {} and {}, got: {}",
                self.frame_min_limit, self.frame_max_limit, self.max_frame_length
            )));
        }

        if !(self.desired_ber > 0.0 && self.desired_ber < 1.0) {
            return Err(AppError::config(format!("Desired BER must be between 0 and 1 (exclusive), got: {}", self.desired_ber)));
        }

        if !self.test_duration.is_finite() || self.test_duration <= 0.0 {
            return Err(AppError::config(format!("Test duration must be greater than 0, got: {}", self.test_duration)));
        }

        Ok(())
    }

    /// Select the transport variant this configuration describes.
    ///
    /// Fails when no transport is configured, when only one of remote host
    /// and port is given, or when a serial port and a remote host are both
    /// given.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let serial_port = self.serial_port.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let remote_host = self.remote_host.as_deref().map(str::trim).filter(|h| !h.is_empty());

        match (serial_port, remote_host, self.remote_port) {
            (Some(_), Some(_), _) | (Some(_), None, Some(_)) => Err(AppError::config(
                "Both a serial port and a remote host are configured; choose one transport",
            )),
            (Some(port), None, None) => {
                if self.stop_bits == StopBits::OnePointFive {
                    return Err(AppError::config("1.5 stop bits are not supported on serial ports"));
                }
                Ok(TransportConfig::Serial(SerialSettings {
                    port: port.to_string(),
                    framing: self.framing(),
                    read_timeout: self.read_timeout(),
                }))
            }
            (None, Some(host), Some(port)) => Ok(TransportConfig::TcpLoopback(TcpSettings {
                host: host.to_string(),
                port,
                framing: self.framing(),
                timeout: self.tcp_timeout(),
            })),
            (None, Some(host), None) => Err(AppError::config(format!(
                "Remote host '{}' given without a remote port", host
            ))),
            (None, None, Some(port)) => Err(AppError::config(format!(
                "Remote port {} given without a remote host", port
            ))),
            (None, None, None) => Err(AppError::config(
                "No transport configured: set a serial port or a remote host and port",
            )),
        }
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("SERIAL_PORT") {
            self.serial_port = non_empty(port);
        }

        if let Ok(host) = std::env::var("REMOTE_HOST") {
            self.remote_host = non_empty(host);
        }

        if let Ok(port) = std::env::var("REMOTE_PORT") {
            self.remote_port = match non_empty(port) {
                Some(value) => Some(parse_env("REMOTE_PORT", &value)?),
                None => None,
            };
        }

        if let Ok(value) = std::env::var("DEFAULT_BAUDRATE") {
            self.baudrate = parse_env("DEFAULT_BAUDRATE", &value)?;
        }

        if let Ok(value) = std::env::var("DEFAULT_DATA_BIT") {
            self.data_bits = parse_env("DEFAULT_DATA_BIT", &value)?;
        }

        if let Ok(value) = std::env::var("DEFAULT_PARITY") {
            self.parity = parse_env("DEFAULT_PARITY", &value)?;
        }

        if let Ok(value) = std::env::var("DEFAULT_STOP_BIT") {
            self.stop_bits = parse_env("DEFAULT_STOP_BIT", &value)?;
        }

        if let Ok(value) = std::env::var("READ_TIMEOUT") {
            self.read_timeout_secs = parse_env("READ_TIMEOUT", &value)?;
        }

        if let Ok(value) = std::env::var("TCP_PACKET_TIMEOUT") {
            self.tcp_timeout_secs = parse_env("TCP_PACKET_TIMEOUT", &value)?;
        }

        if let Ok(value) = std::env::var("DATA_TIMEOUT") {
            self.data_timeout_secs = parse_env("DATA_TIMEOUT", &value)?;
        }

        if let Ok(value) = std::env::var("FRAME_MIN_LIMIT") {
            self.frame_min_limit = parse_env("FRAME_MIN_LIMIT", &value)?;
        }

        if let Ok(value) = std::env::var("FRAME_MAX_LIMIT") {
            self.frame_max_limit = parse_env("FRAME_MAX_LIMIT", &value)?;
        }

        if let Ok(value) = std::env::var("DESIRED_BER") {
            self.desired_ber = parse_env("DESIRED_BER", &value)?;
        }

        if let Ok(value) = std::env::var("TEST_DURATION") {
            self.test_duration = parse_env("TEST_DURATION", &value)?;
        }

        if let Ok(value) = std::env::var("TEST_DURATION_UNIT") {
            self.duration_unit = parse_env("TEST_DURATION_UNIT", &value)?;
        }

        if let Ok(value) = std::env::var("ENABLE_COLOR") {
            self.enable_color = parse_env("ENABLE_COLOR", &value)?;
        }

        Ok(())
    }
}

/// Serial framing shared by both transport variants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Framing {
    pub baudrate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Framing {
    pub fn frame_structure(&self) -> FrameStructure {
        FrameStructure::from_framing(self.data_bits, self.parity, self.stop_bits)
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{}{}", self.baudrate, self.data_bits, self.parity, self.stop_bits)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    pub framing: Framing,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub framing: Framing,
    pub timeout: Duration,
}

/// The one transport a session runs over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportConfig {
    Serial(SerialSettings),
    TcpLoopback(TcpSettings),
}

impl TransportConfig {
    pub fn framing(&self) -> Framing {
        match self {
            TransportConfig::Serial(settings) => settings.framing,
            TransportConfig::TcpLoopback(settings) => settings.framing,
        }
    }

    pub fn frame_structure(&self) -> FrameStructure {
        self.framing().frame_structure()
    }

    /// Short description for headers and logs
    pub fn describe(&self) -> String {
        match self {
            TransportConfig::Serial(settings) => format!("serial {} @ {}", settings.port, settings.framing),
            TransportConfig::TcpLoopback(settings) => format!("tcp {}:{}", settings.host, settings.port),
        }
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

// Default value functions for serde
fn default_baudrate() -> u32 {
    defaults::DEFAULT_BAUDRATE
}

fn default_read_timeout() -> f64 {
    defaults::DEFAULT_READ_TIMEOUT.as_secs_f64()
}

fn default_tcp_timeout() -> f64 {
    defaults::DEFAULT_TCP_TIMEOUT.as_secs_f64()
}

fn default_data_timeout() -> f64 {
    defaults::DEFAULT_DATA_TIMEOUT.as_secs_f64()
}

fn default_frame_min_limit() -> usize {
    defaults::DEFAULT_FRAME_MIN_LIMIT
}

fn default_frame_max_limit() -> usize {
    defaults::DEFAULT_FRAME_MAX_LIMIT
}

fn default_max_frame_length() -> usize {
    defaults::DEFAULT_MAX_FRAME_LENGTH
}

fn default_desired_ber() -> f64 {
    defaults::DEFAULT_DESIRED_BER
}

fn default_test_duration() -> f64 {
    defaults::DEFAULT_TEST_DURATION
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}
