//! Structured logging for BER test runs
//!
//! - Leveled, structured entries with session and correlation ids
//! - Console, JSON and compact output formats
//! - Trial logger for per-trial exchanges and run summaries
//! - Transport logger for connect/close events
//! - Error event logger carrying error category and exit code

use crate::error::{AppError, Result};
use crate::models::{Config, LoopbackSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID tying related events together (e.g. one run)
    pub correlation_id: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub thread_id: Option<String>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// One JSON object per line
    Json,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    current_correlation_id: Option<String>,
    context_fields: BTreeMap<String, serde_json::Value>,
}

/// Logger with configurable level, format and shared context
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a logger at Info level with console output
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger whose level and format follow the run configuration:
    /// debug gives Debug level JSON with locations, verbose gives Info,
    /// otherwise only warnings and errors are shown.
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = match (config.debug, config.verbose) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Info,
            (false, false) => LogLevel::Warn,
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        self.context.write().await.session_id = Some(session_id);
    }

    /// Add a field attached to every subsequent entry
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.context.write().await.context_fields.insert(key, json_value);
        }
    }

    /// Correlation id of the operation in progress, if any
    pub async fn correlation_id(&self) -> Option<String> {
        self.context.read().await.current_correlation_id.clone()
    }

    /// Start a correlated operation and return its correlation id
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.context.write().await.current_correlation_id = Some(correlation_id.clone());

        self.debug(&format!("Started {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("phase", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.debug(&format!("Finished {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("phase", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Fatal, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        {
            let context = self.context.read().await;
            if let Some(session_id) = &context.session_id {
                entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
            }
            if entry.correlation_id.is_none() {
                entry.correlation_id = context.current_correlation_id.clone();
            }
            for (key, value) in &context.context_fields {
                entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let output = self.render(&entry);

        // Warnings and errors go to stderr so reports on stdout stay clean
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), entry.level.as_str(), LogLevel::reset_code())
        } else {
            format!("{:>5}", entry.level.as_str())
        };

        let mut output = format!("{} {} [{}] {}", timestamp, level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let fields: Vec<String> = entry.fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|_| {
            serde_json::json!({ "error": "unserializable log entry", "message": entry.message }).to_string()
        })
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
                thread_id: std::thread::current().name().map(String::from),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach the statistics of one loopback sample
    pub fn sample(self, sample: &LoopbackSample) -> Self {
        self.field("tx_bytes", sample.total_bytes())
            .field("rx_bytes", sample.received().len())
            .field("error_frames", sample.total_error_frames())
            .field("error_bits", sample.total_error_bits())
            .field("travel_ms", sample.elapsed().as_secs_f64() * 1000.0)
    }

    /// Attach error category, recoverability and exit code
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for trial exchanges and run summaries
#[derive(Clone)]
pub struct TrialLogger {
    logger: Logger,
}

impl TrialLogger {
    pub fn new(config: &Config) -> Self {
        Self::from_logger(Logger::with_config("TRIAL".to_string(), config))
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// One completed trial, with the raw tx/rx data at trace level
    pub async fn log_trial(&self, trial: usize, sample: &LoopbackSample) {
        self.logger.debug(&format!(
            "Trial {}: {} bytes sent, {} received in {:.2} ms",
            trial,
            sample.total_bytes(),
            sample.received().len(),
            sample.elapsed().as_secs_f64() * 1000.0
        ))
            .field("trial", trial)
            .sample(sample)
            .log()
            .await;

        if self.logger.would_log(LogLevel::Trace) {
            crate::log_trace!(self.logger, "Trial {} tx >> {}", trial, String::from_utf8_lossy(sample.sent()));
            crate::log_trace!(self.logger, "Trial {} rx << {}", trial, String::from_utf8_lossy(sample.received()));
        }
    }

    /// Echo length differs from what was sent; alignment will be used
    pub async fn log_length_mismatch(&self, trial: usize, sent: usize, received: usize) {
        self.logger.debug(&format!("Trial {}: length mismatch, sent {} received {}", trial, sent, received))
            .field("trial", trial)
            .field("sent_len", sent)
            .field("received_len", received)
            .log()
            .await;
    }

    /// Trial aborted by a transport failure
    pub async fn log_trial_failure(&self, trial: usize, error: &AppError, skipped: bool) {
        self.logger.warn(&format!("Trial {} failed: {}", trial, error))
            .field("trial", trial)
            .field("skipped", skipped)
            .error_info(error)
            .log()
            .await;
    }

    /// Baud rate inferred from the first sample with a nonzero data rate
    pub async fn log_baudrate_estimate(&self, data_rate: f64, baudrate: u32) {
        self.logger.info(&format!("Estimated line speed {} baud", baudrate))
            .field("avg_data_rate", data_rate)
            .field("estimated_baudrate", baudrate)
            .log()
            .await;
    }

    /// Open a correlated run; entries logged until [`end_run`](Self::end_run)
    /// carry the returned id
    pub async fn begin_run(&self, mode: &str) -> String {
        self.logger.start_operation(mode).await
    }

    pub async fn end_run(&self, correlation_id: &str, mode: &str, success: bool) {
        self.logger.end_operation(correlation_id, mode, success).await;
    }

    /// Loop-check outcome with how much of the payload came back
    pub async fn log_loop_check(&self, echoed: usize, expected: usize, status: &str) {
        crate::log_debug!(self.logger, "Loop check: {} of {} bytes echoed, {}", echoed, expected, status);
    }

    /// Summary of a finished run
    pub async fn log_run_summary(&self, trials: usize, failed: usize, elapsed: Duration, bit_error_rate: f64) {
        self.logger.info(&format!(
            "Run finished: {} trials ({} failed) in {:.1}s, BER {:.3e}",
            trials, failed, elapsed.as_secs_f64(), bit_error_rate
        ))
            .field("trials", trials)
            .field("failed_trials", failed)
            .field("elapsed_secs", elapsed.as_secs_f64())
            .field("bit_error_rate", bit_error_rate)
            .log()
            .await;
    }
}

/// Logger for transport lifecycle events
pub struct TransportLogger {
    logger: Logger,
}

impl TransportLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("LINK".to_string(), config),
        }
    }

    /// Log a connect/open attempt
    pub async fn log_open(&self, target: &str, success: bool, error: Option<&AppError>) {
        let (level, message) = if success {
            (LogLevel::Info, format!("Opened {}", target))
        } else {
            (LogLevel::Warn, format!("Failed to open {}", target))
        };

        let mut builder = self.logger.log(level, &message)
            .field("target", target)
            .field("success", success);

        if let Some(err) = error {
            builder = builder.field("error", err.to_string()).error_info(err);
        }

        builder.log().await;
    }

    /// Log endpoint addresses of an opened socket
    pub async fn log_endpoints(&self, local: Option<&str>, peer: Option<&str>) {
        self.logger.debug("Socket endpoints")
            .field("local", local.map(str::trim))
            .field("peer", peer.map(str::trim))
            .log()
            .await;
    }

    pub async fn log_close(&self, target: &str) {
        self.logger.debug(&format!("Closed {}", target))
            .field("target", target)
            .log()
            .await;
    }

    /// Log the outcome of a host reachability probe
    pub async fn log_probe(&self, host: &str, port: u16, reachable: bool) {
        let level = if reachable { LogLevel::Info } else { LogLevel::Warn };
        self.logger.log(level, &format!("{}:{} is {}", host, port, if reachable { "reachable" } else { "unreachable" }))
            .field("host", host)
            .field("port", port)
            .field("reachable", reachable)
            .log()
            .await;
    }
}

/// Error event logger with enhanced context
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>, correlation_id: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };

        let builder = match error {
            AppError::Internal(_) => self.logger.fatal(&message),
            _ => self.logger.error(&message),
        };
        let mut builder = builder.error_info(error);

        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }
        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }
}

/// Hands out loggers sharing one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_trial_logger(&self) -> TrialLogger {
        TrialLogger::from_logger(self.create_logger("TRIAL").await)
    }

    pub fn create_transport_logger(&self) -> TransportLogger {
        TransportLogger::new(&self.config)
    }

    pub fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::new(&self.config)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Logging macros that attach file, line and module
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}
