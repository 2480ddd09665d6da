//! Serial BER Tester
//!
//! Measures the bit-error rate of a loopback link, either a physical serial
//! line or a TCP raw-socket substitute, by echoing test patterns through it,
//! aligning what came back against what was sent, and reporting byte and bit
//! level error statistics together with a Poisson confidence level against a
//! target BER.

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod pattern;
pub mod ports;
pub mod stats;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, LoopbackSample, TransportConfig};
pub use compare::{ByteDiff, ErrorMap};
pub use executor::{TestSession, ProgressHandle, TrialErrorPolicy};
pub use stats::{estimate_baudrate, confidence_level, SessionReport};
pub use transport::{Transport, TransportPort, SharedPort};
pub use types::{FrameStructure, Parity, DataBits, StopBits};
pub use output::{OutputFormatter, ColoredFormatter, PlainFormatter, OutputCoordinator, OutputFormatterFactory};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_BAUDRATE: u32 = 9600;
    pub const DEFAULT_DATA_BITS: u8 = 8;
    pub const DEFAULT_PARITY: char = 'N';
    pub const DEFAULT_STOP_BITS: f64 = 1.0;
    /// Driver-level blocking read timeout of the serial line
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1200);
    /// Connect and per-read timeout of the TCP loopback socket
    pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(3);
    /// Wall-clock bound of one echo exchange
    pub const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_FRAME_MIN_LIMIT: usize = 1;
    pub const DEFAULT_FRAME_MAX_LIMIT: usize = 1024;
    pub const DEFAULT_MAX_FRAME_LENGTH: usize = 255;
    pub const DEFAULT_DESIRED_BER: f64 = 1e-6;
    pub const DEFAULT_TEST_DURATION: f64 = 10.0;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Standard line speeds the baud-rate estimate snaps to, ascending
    pub const BAUD_RATES: &[u32] = &[600, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

    /// Payload used by the link loop check
    pub const LOOP_CHECK_PAYLOAD: &[u8] = b"loop";
}
