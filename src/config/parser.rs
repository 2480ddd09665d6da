//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that layers defaults, `.env`, environment and CLI
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        // A transport chosen on the command line replaces any from the environment
        if let Some(port) = &cli.port {
            config.serial_port = Some(port.clone());
            config.remote_host = None;
            config.remote_port = None;
        }
        if let Some(host) = &cli.host {
            config.remote_host = Some(host.clone());
            config.serial_port = None;
        }
        if let Some(port) = cli.remote_port {
            config.remote_port = Some(port);
        }

        if let Some(baud) = cli.baud {
            config.baudrate = baud;
        }
        if let Some(data_bits) = cli.data_bits {
            config.data_bits = data_bits;
        }
        if let Some(parity) = cli.parity {
            config.parity = parity;
        }
        if let Some(stop_bits) = cli.stop_bits {
            config.stop_bits = stop_bits;
        }

        if let Some(secs) = cli.read_timeout {
            config.read_timeout_secs = secs;
        }
        if let Some(secs) = cli.tcp_timeout {
            config.tcp_timeout_secs = secs;
        }
        if let Some(secs) = cli.data_timeout {
            config.data_timeout_secs = secs;
        }

        if let Some(duration) = cli.duration {
            config.test_duration = duration;
        }
        if let Some(unit) = cli.unit {
            config.duration_unit = unit;
        }

        if let Some(length) = cli.frame_length {
            config.max_frame_length = length as usize;
        }
        if let Some(length) = cli.min_length {
            config.frame_min_limit = length as usize;
        }
        if let Some(mode) = cli.frame_mode {
            config.frame_mode = mode;
        }
        if let Some(pattern) = cli.pattern {
            config.pattern = pattern;
        }
        if let Some(ber) = cli.ber {
            config.desired_ber = ber;
        }

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = cli.verbose;
        config.debug = cli.debug;
        config.json = cli.json;

        if config.debug {
            println!("Applied CLI overrides to configuration");
            println!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for verbose/debug output
pub fn display_config_summary(config: &Config) -> String {
    let transport = config.transport_config()
        .map(|t| t.describe())
        .unwrap_or_else(|_| "not configured".to_string());

    let mut summary = Vec::new();
    summary.push(format!("Transport: {}", transport));
    summary.push(format!("Framing: {}", config.framing()));
    summary.push(format!("Frame size: {} bits", config.frame_structure().frame_size()));
    summary.push(format!(
        "Timeouts: read {}s, tcp {}s, data {}s",
        config.read_timeout_secs, config.tcp_timeout_secs, config.data_timeout_secs
    ));
    summary.push(format!(
        "Frames: {:?} mode, {} bytes (limits {}-{}), {:?} pattern",
        config.frame_mode, config.max_frame_length, config.frame_min_limit, config.frame_max_limit, config.pattern
    ));
    summary.push(format!("Duration: {}{}", config.test_duration, config.duration_unit.as_str()));
    summary.push(format!("Desired BER: {:e}", config.desired_ber));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parity, StopBits};
    use clap::Parser;
    use std::env;
    use std::sync::Mutex;

    static MUTEX: Mutex<()> = Mutex::new(());

    /// Move `.env` aside and clear supported variables for the duration of a test
    struct IsolatedEnv {
        backup: Option<&'static str>,
    }

    impl IsolatedEnv {
        fn new(backup_name: &'static str) -> Self {
            for (var, _, _) in EnvManager::get_supported_env_vars() {
                env::remove_var(var);
            }
            let backup = if std::path::Path::new(".env").exists() {
                let _ = std::fs::rename(".env", backup_name);
                Some(backup_name)
            } else {
                None
            };
            Self { backup }
        }
    }

    impl Drop for IsolatedEnv {
        fn drop(&mut self) {
            if let Some(name) = self.backup {
                let _ = std::fs::rename(name, ".env");
            }
        }
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = MUTEX.lock().unwrap_or_else(|p| p.into_inner());
        let _env = IsolatedEnv::new(".env.test_backup_cli_overrides");

        let cli = Cli::parse_from([
            "sbert", "--port", "COM3", "--baud", "19200", "--parity", "O", "--stop-bits", "2",
            "--frame-length", "64", "--ber", "1e-5", "--no-color", "--verbose",
        ]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.serial_port.as_deref(), Some("COM3"));
        assert_eq!(config.baudrate, 19200);
        assert_eq!(config.parity, Parity::Odd);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert_eq!(config.max_frame_length, 64);
        assert_eq!(config.desired_ber, 1e-5);
        assert!(!config.enable_color);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = MUTEX.lock().unwrap_or_else(|p| p.into_inner());
        let _env = IsolatedEnv::new(".env.test_backup_cli_overrides_env");

        env::set_var("DEFAULT_BAUDRATE", "4800");
        env::set_var("REMOTE_HOST", "10.0.0.2");
        env::set_var("REMOTE_PORT", "4001");

        let config = ConfigParser::new(Cli::parse_from(["sbert"])).parse().unwrap();
        assert_eq!(config.baudrate, 4800);
        assert_eq!(config.remote_host.as_deref(), Some("10.0.0.2"));

        // A serial port on the command line wins over the environment's host
        let cli = Cli::parse_from(["sbert", "--baud", "57600", "--port", "/dev/ttyS1"]);
        let config = ConfigParser::new(cli).parse().unwrap();
        assert_eq!(config.baudrate, 57600);
        assert!(config.transport_config().unwrap().framing().baudrate == 57600);
        assert!(config.remote_host.is_none());

        env::remove_var("DEFAULT_BAUDRATE");
        env::remove_var("REMOTE_HOST");
        env::remove_var("REMOTE_PORT");
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let _guard = MUTEX.lock().unwrap_or_else(|p| p.into_inner());
        let _env = IsolatedEnv::new(".env.test_backup_invalid_override");

        let cli = Cli::parse_from(["sbert", "--min-length", "300"]);
        let err = ConfigParser::new(cli).parse().unwrap_err();
        assert_eq!(err.category(), "CONFIG");
    }

    #[test]
    fn test_config_summary() {
        let config = Config {
            remote_host: Some("127.0.0.1".to_string()),
            remote_port: Some(7),
            ..Config::default()
        };
        let summary = display_config_summary(&config);

        assert!(summary.contains("Transport: tcp 127.0.0.1:7"));
        assert!(summary.contains("Framing: 9600 8N1"));
        assert!(summary.contains("Frame size: 10 bits"));
        assert!(summary.contains("Duration: 10s"));

        assert!(display_config_summary(&Config::default()).contains("Transport: not configured"));
    }
}
