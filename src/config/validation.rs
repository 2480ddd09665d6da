//! Non-fatal configuration checks

use crate::{
    defaults::BAUD_RATES,
    error::Result,
    models::Config,
    types::FrameMode,
};
use colored::Colorize;
use std::time::Duration;

/// Runs longer than this get an informational note
const LONG_RUN: Duration = Duration::from_secs(30 * 60);

/// Configuration validator producing warnings on top of `Config::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks, then collect warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_line_settings(config));
        warnings.extend(Self::validate_timeouts(config));
        warnings.extend(Self::validate_run_length(config));
        Ok(warnings)
    }

    fn validate_line_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if !BAUD_RATES.contains(&config.baudrate) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Baud rate {} is not a standard rate; the line speed estimate will snap to the table", config.baudrate),
            ));
        }

        if config.remote_host.is_some() && config.serial_port.is_none() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("TCP loopback: framing {} is only used for bit accounting", config.framing()),
            ));
        }

        warnings
    }

    fn validate_timeouts(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        // The echo loop checks its deadline between reads only
        if config.serial_port.is_some() && config.read_timeout_secs >= config.data_timeout_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Read timeout ({}s) is not shorter than the data timeout ({}s); trials may overrun by up to one read",
                    config.read_timeout_secs, config.data_timeout_secs
                ),
            ));
        }

        let longest_frame_secs = config.max_frame_length as f64 * config.frame_structure().frame_size()
            / f64::from(config.baudrate.max(1));
        if longest_frame_secs * 2.0 > config.data_timeout_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "A {}-byte echo takes about {:.2}s at {} baud, close to the {}s data timeout",
                    config.max_frame_length, longest_frame_secs * 2.0, config.baudrate, config.data_timeout_secs
                ),
            ));
        }

        warnings
    }

    fn validate_run_length(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let duration = config.test_duration();

        if duration > LONG_RUN {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Timed run lasts {:.0} minutes", duration.as_secs_f64() / 60.0),
            ));
        }

        if config.frame_mode == FrameMode::Random && config.frame_min_limit == config.max_frame_length {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Random frame mode with equal minimum and maximum length sends fixed-length frames",
            ));
        }

        // Best case: the line is saturated for the whole run
        let planned_bits = duration.as_secs_f64() * f64::from(config.baudrate);
        if planned_bits * config.desired_ber < 1.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "At most {:.0} bits fit in the run; a BER of {:e} needs at least {:.0} to be meaningful",
                    planned_bits, config.desired_ber, 1.0 / config.desired_ber
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        let tag = if use_color {
            match self.level {
                ValidationLevel::Info => tag.blue().to_string(),
                ValidationLevel::Warning => tag.yellow().to_string(),
                ValidationLevel::Error => tag.red().to_string(),
            }
        } else {
            tag
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
