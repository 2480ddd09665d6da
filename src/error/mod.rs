//! Error handling for the serial BER tester

use thiserror::Error;

/// Custom error types for the serial BER tester
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (transport under-specified, bad framing, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failures at the OS/driver level (connect, write, read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (numbers, JSON, addresses, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Test execution errors
    #[error("Test execution error: {0}")]
    TestExecution(String),

    /// Statistics calculation errors
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new test execution error
    pub fn test_execution<S: Into<String>>(message: S) -> Self {
        Self::TestExecution(message.into())
    }

    /// Create a new statistics error
    pub fn statistics<S: Into<String>>(message: S) -> Self {
        Self::Statistics(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Transport(_) => "TRANSPORT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::TestExecution(_) => "TEST",
            Self::Statistics(_) => "STATS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (a timed run may continue past it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => false,
            Self::Io(_) | Self::TestExecution(_) | Self::Statistics(_) | Self::Internal(_) => false,
        }
    }

    /// Troubleshooting hints for the failure, most likely cause first
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::Config(_) | Self::Validation(_) => &[
                "Pass --port for a serial line, or --host with --remote-port for an echo server",
                "Check SERIAL_PORT, REMOTE_HOST and REMOTE_PORT in your .env file",
                "Serial ports support 1 or 2 stop bits only",
            ],
            Self::Transport(_) => &[
                "Run with --list-ports to see the devices the OS reports",
                "Check that TX and RX are looped back at the far end",
                "Make sure no other program holds the port open",
            ],
            Self::Timeout(_) => &[
                "Raise --tcp-timeout or --data-timeout",
                "Check the echo server with --check-host",
            ],
            Self::TestExecution(_) => &["Check the loopback plug or echo server, then retry with --mode loop"],
            Self::Internal(_) => &["Run again with --debug and report the output"],
            Self::Io(_) | Self::Parse(_) | Self::Statistics(_) => &[],
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::Transport(_) => 2,  // Link issues
            Self::Timeout(_) => 3,  // Timeout issues
            Self::Io(_) => 5,  // I/O issues
            Self::TestExecution(_) | Self::Statistics(_) => 6,  // Test execution issues
            Self::Internal(_) => 99,  // Internal/unexpected errors
        }
    }

    /// Color of the category tag: red for bad input, yellow for link
    /// trouble, cyan for failed runs
    fn console_color(&self) -> colored::Color {
        use colored::Color;
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Transport(_) | Self::Timeout(_) => Color::Yellow,
            Self::Io(_) | Self::TestExecution(_) | Self::Statistics(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, the tag colored by severity
    pub fn format_for_console(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.category());
        if use_color {
            use colored::Colorize;
            format!("{} {}", tag.color(self.console_color()).bold(), self)
        } else {
            format!("{} {}", tag, self)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serialport::Error> for AppError {
    fn from(error: serialport::Error) -> Self {
        match error.kind() {
            serialport::ErrorKind::InvalidInput => Self::config(format!("Serial port rejected settings: {}", error)),
            _ => Self::transport(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}


/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            let context = f();
            AppError::internal(format!("{}: {}", context, original_error))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Error reporter for structured error logging and user feedback
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user, with hints on stderr
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        let hints = error.hints();
        if !hints.is_empty() {
            eprintln!();
            eprintln!("Hints:");
            for hint in hints {
                eprintln!("  - {}", hint);
            }
        }

        if self.verbose && error.is_recoverable() {
            let note = "A timed run skips trials that fail this way unless --abort-on-error is set.";
            eprintln!();
            if self.use_color {
                use colored::Colorize;
                eprintln!("{}", note.green());
            } else {
                eprintln!("{}", note);
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
