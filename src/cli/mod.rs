//! Command-line interface

use crate::types::{DataBits, DurationUnit, FrameMode, Parity, PatternKind, StopBits};
use clap::{Parser, ValueEnum};

/// How the tester drives the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RunMode {
    /// A single trial
    Once,
    /// Back-to-back trials for the configured duration
    #[default]
    Timed,
    /// Echo the fixed loop-check payload once
    Loop,
}

/// Serial BER Tester - measure bit error rate over a looped-back serial line
#[derive(Parser, Debug, Clone)]
#[command(name = "sbert")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Serial device to test (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Echo server host, tests over TCP instead of a serial line
    #[arg(long)]
    pub host: Option<String>,

    /// Echo server port
    #[arg(long)]
    pub remote_port: Option<u16>,

    /// Line speed in baud
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits per character (7 or 8)
    #[arg(long)]
    pub data_bits: Option<DataBits>,

    /// Parity (N, E or O)
    #[arg(long)]
    pub parity: Option<Parity>,

    /// Stop bits (1, 1.5 or 2)
    #[arg(long)]
    pub stop_bits: Option<StopBits>,

    /// Serial driver read timeout in seconds
    #[arg(long, value_parser = parse_seconds)]
    pub read_timeout: Option<f64>,

    /// TCP connect and read timeout in seconds
    #[arg(long, value_parser = parse_seconds)]
    pub tcp_timeout: Option<f64>,

    /// Time to wait for each echo in seconds
    #[arg(long, value_parser = parse_seconds)]
    pub data_timeout: Option<f64>,

    /// Run mode
    #[arg(short, long, value_enum, default_value_t = RunMode::Timed)]
    pub mode: RunMode,

    /// Length of a timed run, in --unit
    #[arg(short, long, value_parser = parse_seconds)]
    pub duration: Option<f64>,

    /// Unit of --duration (s or m)
    #[arg(long)]
    pub unit: Option<DurationUnit>,

    /// Payload length of each trial in bytes
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub frame_length: Option<u64>,

    /// Shortest payload in random frame mode
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub min_length: Option<u64>,

    /// Frame length mode (fixed or random)
    #[arg(long)]
    pub frame_mode: Option<FrameMode>,

    /// Payload content (cyclic or random)
    #[arg(long)]
    pub pattern: Option<PatternKind>,

    /// Target bit error rate for the confidence level
    #[arg(long)]
    pub ber: Option<f64>,

    /// Stop a timed run at the first failed trial
    #[arg(long)]
    pub abort_on_error: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// List available serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Check that the echo server accepts connections and exit
    #[arg(long)]
    pub check_host: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.port.is_some() && (self.host.is_some() || self.remote_port.is_some()) {
            return Err("Cannot test a serial port and a remote host at the same time".to_string());
        }

        if self.list_ports && self.check_host {
            return Err("Cannot combine --list-ports and --check-host".to_string());
        }

        if let Some(ber) = self.ber {
            if !(ber > 0.0 && ber < 1.0) {
                return Err(format!("--ber must be between 0 and 1 (exclusive), got: {}", ber));
            }
        }

        if let (Some(min), Some(max)) = (self.min_length, self.frame_length) {
            if min > max {
                return Err(format!("--min-length ({}) cannot exceed --frame-length ({})", min, max));
            }
        }

        Ok(())
    }

    /// Whether the run talks to a serial device or an echo server
    pub fn runs_trials(&self) -> bool {
        !self.list_ports && !self.check_host
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a positive number of seconds, fractions allowed
fn parse_seconds(s: &str) -> Result<f64, String> {
    if s.starts_with('+') {
        return Err(format!("Invalid duration: {}", s));
    }

    let secs: f64 = s.parse().map_err(|_| format!("Invalid duration: {}", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        Err("Duration must be greater than 0".to_string())
    } else {
        Ok(secs)
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if std::env::var("TERM").map(|term| term == "dumb").unwrap_or(false) {
        return false;
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["sbert"]);
        assert_eq!(cli.mode, RunMode::Timed);
        assert!(cli.port.is_none());
        assert!(cli.baud.is_none());
        assert!(!cli.json);
        assert!(cli.runs_trials());
    }

    #[test]
    fn test_cli_parsing_serial_options() {
        let cli = Cli::parse_from([
            "sbert",
            "--port", "/dev/ttyUSB0",
            "--baud", "115200",
            "--data-bits", "7",
            "--parity", "E",
            "--stop-bits", "2",
            "--read-timeout", "0.5",
            "--mode", "once",
            "--frame-length", "64",
            "--pattern", "random",
        ]);

        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.baud, Some(115200));
        assert_eq!(cli.data_bits, Some(DataBits::Seven));
        assert_eq!(cli.parity, Some(Parity::Even));
        assert_eq!(cli.stop_bits, Some(StopBits::Two));
        assert_eq!(cli.read_timeout, Some(0.5));
        assert_eq!(cli.mode, RunMode::Once);
        assert_eq!(cli.frame_length, Some(64));
        assert_eq!(cli.pattern, Some(PatternKind::Random));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_tcp_options() {
        let cli = Cli::parse_from([
            "sbert", "--host", "192.168.1.50", "--remote-port", "4001",
            "-d", "2", "--unit", "m", "--frame-mode", "random", "--min-length", "8",
        ]);

        assert_eq!(cli.host.as_deref(), Some("192.168.1.50"));
        assert_eq!(cli.remote_port, Some(4001));
        assert_eq!(cli.duration, Some(2.0));
        assert_eq!(cli.unit, Some(DurationUnit::Minutes));
        assert_eq!(cli.frame_mode, Some(FrameMode::Random));
        assert_eq!(cli.min_length, Some(8));
    }

    #[test]
    fn test_invalid_values_rejected_by_parser() {
        assert!(Cli::try_parse_from(["sbert", "--data-bits", "9"]).is_err());
        assert!(Cli::try_parse_from(["sbert", "--parity", "X"]).is_err());
        assert!(Cli::try_parse_from(["sbert", "--frame-length", "0"]).is_err());
        assert!(Cli::try_parse_from(["sbert", "--frame-length", "1025"]).is_err());
        assert!(Cli::try_parse_from(["sbert", "--mode", "forever"]).is_err());
        assert!(Cli::try_parse_from(["sbert", "--remote-port", "70000"]).is_err());
    }

    #[test]
    fn test_cli_validation() {
        let cli = Cli::parse_from(["sbert", "--color", "--no-color"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["sbert", "--port", "COM3", "--host", "localhost"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["sbert", "--list-ports", "--check-host"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["sbert", "--ber", "1.5"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["sbert", "--min-length", "100", "--frame-length", "10"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["sbert", "--list-ports"]);
        assert!(cli.validate().is_ok());
        assert!(!cli.runs_trials());
    }

    #[test]
    fn test_seconds_parsing() {
        assert_eq!(parse_seconds("3").unwrap(), 3.0);
        assert_eq!(parse_seconds("1.2").unwrap(), 1.2);
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("+5").is_err());
        assert!(parse_seconds("abc").is_err());
        assert!(parse_seconds("inf").is_err());
    }

    #[test]
    fn test_use_colors_method() {
        assert!(Cli::parse_from(["sbert", "--color"]).use_colors());
        assert!(!Cli::parse_from(["sbert", "--no-color"]).use_colors());
    }
}
