//! Environment variable handling and .env file management

use crate::{
    error::{AppError, Result},
    types::{DataBits, DurationUnit, Parity, StopBits},
};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists. Variables already set in the process
    /// environment are not overwritten.
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                println!("Loaded configuration from .env file");
            }
        } else if debug {
            println!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Serial BER Tester Configuration
#
# Values here are used as defaults and can be overridden by
# command-line arguments.

# Serial device to test
# SERIAL_PORT=/dev/ttyUSB0

# Or an echo server reached over TCP (host and port together)
# REMOTE_HOST=192.168.1.50
# REMOTE_PORT=4001

# Line framing
# DEFAULT_BAUDRATE=9600
# DEFAULT_DATA_BIT=8
# DEFAULT_PARITY=N
# DEFAULT_STOP_BIT=1

# Timeouts in seconds
# READ_TIMEOUT=1.2
# TCP_PACKET_TIMEOUT=3
# DATA_TIMEOUT=3

# Payload length limits in bytes (1-1024)
# FRAME_MIN_LIMIT=1
# FRAME_MAX_LIMIT=1024

# Target bit error rate for the confidence level
# DESIRED_BER=1e-6

# Timed run length and its unit (s or m)
# TEST_DURATION=10
# TEST_DURATION_UNIT=s

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#.to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "SERIAL_PORT" | "REMOTE_HOST" => {
                if value.chars().any(char::is_whitespace) {
                    return Err(AppError::config(format!("{} must not contain whitespace, got: '{}'", key, value)));
                }
            }
            "REMOTE_PORT" => {
                let port: u16 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid REMOTE_PORT value '{}': {}", value, e)))?;
                if port == 0 {
                    return Err(AppError::config("REMOTE_PORT must be between 1 and 65535"));
                }
            }
            "DEFAULT_BAUDRATE" => {
                let baud: u32 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid DEFAULT_BAUDRATE value '{}': {}", value, e)))?;
                if baud == 0 {
                    return Err(AppError::config("DEFAULT_BAUDRATE must be greater than 0"));
                }
            }
            "DEFAULT_DATA_BIT" => {
                value.parse::<DataBits>()?;
            }
            "DEFAULT_PARITY" => {
                value.parse::<Parity>()?;
            }
            "DEFAULT_STOP_BIT" => {
                value.parse::<StopBits>()?;
            }
            "READ_TIMEOUT" | "TCP_PACKET_TIMEOUT" | "DATA_TIMEOUT" | "TEST_DURATION" => {
                let secs: f64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(AppError::config(format!("{} must be greater than 0, got: {}", key, secs)));
                }
            }
            "FRAME_MIN_LIMIT" | "FRAME_MAX_LIMIT" => {
                let length: usize = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if length == 0 || length > crate::defaults::DEFAULT_FRAME_MAX_LIMIT {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and {}, got: {}",
                        key, crate::defaults::DEFAULT_FRAME_MAX_LIMIT, length
                    )));
                }
            }
            "DESIRED_BER" => {
                let ber: f64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid DESIRED_BER value '{}': {}", value, e)))?;
                if !(ber > 0.0 && ber < 1.0) {
                    return Err(AppError::config(format!("DESIRED_BER must be between 0 and 1 (exclusive), got: {}", ber)));
                }
            }
            "TEST_DURATION_UNIT" => {
                value.parse::<DurationUnit>()?;
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Supported environment variables as (name, description, example)
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SERIAL_PORT", "Serial device to test", "/dev/ttyUSB0"),
            ("REMOTE_HOST", "Echo server host for TCP tests", "192.168.1.50"),
            ("REMOTE_PORT", "Echo server port for TCP tests", "4001"),
            ("DEFAULT_BAUDRATE", "Line speed in baud", "9600"),
            ("DEFAULT_DATA_BIT", "Data bits per character (7 or 8)", "8"),
            ("DEFAULT_PARITY", "Parity (N, E or O)", "N"),
            ("DEFAULT_STOP_BIT", "Stop bits (1, 1.5 or 2)", "1"),
            ("READ_TIMEOUT", "Serial driver read timeout in seconds", "1.2"),
            ("TCP_PACKET_TIMEOUT", "TCP connect/read timeout in seconds", "3"),
            ("DATA_TIMEOUT", "Echo wait per trial in seconds", "3"),
            ("FRAME_MIN_LIMIT", "Shortest payload in bytes (1-1024)", "1"),
            ("FRAME_MAX_LIMIT", "Longest payload in bytes (1-1024)", "1024"),
            ("DESIRED_BER", "Target bit error rate", "1e-6"),
            ("TEST_DURATION", "Timed run length", "10"),
            ("TEST_DURATION_UNIT", "Unit of TEST_DURATION (s or m)", "s"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Environment variable help text
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<20} {}\n", var, description));
            help.push_str(&format!("  {:<20} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var, _, _)| {
                let value = std::env::var(var).ok()?;
                Self::validate_env_var(var, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the entries of `.env` if it exists
    pub fn check_env_file() -> Result<Option<Vec<String>>> {
        let path = Path::new(".env");
        if !path.exists() {
            return Ok(None);
        }
        Self::check_env_content(&std::fs::read_to_string(path)?).map(Some)
    }

    /// Validate `KEY=value` lines, ignoring blanks and comments
    pub fn check_env_content(content: &str) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    if let Err(e) = Self::validate_env_var(key.trim(), value) {
                        warnings.push(format!("Line '{}': {}", line, e));
                    }
                }
                None => warnings.push(format!("Line '{}': expected KEY=value", line)),
            }
        }

        Ok(warnings)
    }
}
