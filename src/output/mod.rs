//! Output formatting and display system
//!
//! Renders session reports, loop check outcomes and port listings as colored
//! or plain text, or as JSON for scripting.

mod formatter;
mod colored;

pub use formatter::{
    OutputFormatter,
    PlainFormatter,
    FormattingOptions,
    MetricTable,
    format_ber,
    format_confidence,
    format_due_time,
    format_seconds,
    summary_table,
};
pub use colored::{
    ColoredFormatter,
    ColorScheme,
    LinkQuality,
    quick_summary,
};

use crate::{
    error::{AppError, Result},
    executor::LoopStatus,
    ports::PortRegistry,
    stats::SessionReport,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            show_trials: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    /// Header followed by the metric summary
    pub fn display_report(&self, report: &SessionReport) -> Result<String> {
        let mut output = String::new();
        output.push_str(&self.formatter.format_header("Serial BER Test Results")?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_summary(report)?);
        Ok(output)
    }

    /// Pretty-printed JSON of the report
    pub fn display_json(&self, report: &SessionReport) -> Result<String> {
        serde_json::to_string_pretty(report)
            .map_err(|e| AppError::parse(format!("Failed to serialize report: {}", e)))
    }

    pub fn display_loop_status(&self, status: LoopStatus, target: &str) -> Result<String> {
        self.formatter.format_loop_status(status, target)
    }

    pub fn display_port_list(&self, registry: &PortRegistry) -> Result<String> {
        self.formatter.format_port_list(registry)
    }

    pub fn display_progress(&self, progress: f64, due_time: f64) -> String {
        self.formatter.format_progress(progress, due_time)
    }
}
