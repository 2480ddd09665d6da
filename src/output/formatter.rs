//! Core formatting trait and the plain text implementation

use crate::{
    error::{AppError, Result},
    executor::LoopStatus,
    ports::PortRegistry,
    stats::{SessionReport, TrialReport},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the aggregate statistics of a run
    fn format_summary(&self, report: &SessionReport) -> Result<String>;

    /// Format one trial: tx/rx data, counters and error positions
    fn format_trial(&self, trial: &TrialReport) -> Result<String>;

    /// Format the outcome of a loop check
    fn format_loop_status(&self, status: LoopStatus, target: &str) -> Result<String>;

    /// Format the discovered serial ports
    fn format_port_list(&self, registry: &PortRegistry) -> Result<String>;

    /// Format a progress line for a timed run in flight
    fn format_progress(&self, progress: f64, due_time: f64) -> String;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Include per-trial sections
    pub show_trials: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Longest tx/rx text shown before truncation
    pub max_data_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            show_trials: false,
            table_borders: true,
            max_data_width: 96,
        }
    }
}

/// Two-column metric table
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    rows: Vec<(String, String)>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.rows.push((label.into(), value.into()));
        self
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Render with labels left aligned and values right aligned
    pub fn render(&self, borders: bool) -> String {
        let label_width = self.rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        let value_width = self.rows.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);

        let border = format!("+{}+{}+", "-".repeat(label_width + 2), "-".repeat(value_width + 2));
        let mut lines = Vec::with_capacity(self.rows.len() + 2);

        if borders {
            lines.push(border.clone());
        }
        for (label, value) in &self.rows {
            if borders {
                lines.push(format!("| {:<lw$} | {:>vw$} |", label, value, lw = label_width, vw = value_width));
            } else {
                lines.push(format!("{:<lw$}  {:>vw$}", label, value, lw = label_width, vw = value_width));
            }
        }
        if borders {
            lines.push(border);
        }

        lines.join("\n")
    }
}

/// Format seconds, stepping the unit down (s, ms, us, ns) while the value
/// is at most 0.1 of the current unit.
pub fn format_seconds(secs: f64, digits: i32) -> String {
    const UNITS: [&str; 4] = ["s", "ms", "us", "ns"];

    let mut value = secs;
    let mut unit = 0;
    while value != 0.0 && value.abs() <= 0.1 && unit + 1 < UNITS.len() {
        value *= 1000.0;
        unit += 1;
    }

    let scale = 10f64.powi(digits);
    format!("{} {}", (value * scale).round() / scale, UNITS[unit])
}

/// Remaining time of a timed run as `[ MM:SS.s ]`
pub fn format_due_time(due_time: f64) -> String {
    let due = due_time.max(0.0);
    format!("[ {:02.0}:{:04.1} ]", (due / 60.0).floor(), due % 60.0)
}

/// BER in the report's scientific notation
pub fn format_ber(ber: f64) -> String {
    format!("{:.1e}", ber)
}

/// Confidence level as a percentage with two decimals
pub fn format_confidence(level: f64) -> String {
    format!("{:.2}%", level * 100.0)
}

/// Standard metric rows shared by every formatter
pub fn summary_table(report: &SessionReport) -> MetricTable {
    let mut table = MetricTable::new()
        .row("Frames Transmitted", report.total_frames_transmitted.to_string())
        .row("Frames Received", report.total_frames_received.to_string())
        .row("Frames Lost", report.total_frames_lost.to_string())
        .row("Tx/Rx Counter", report.trials_completed.to_string());

    if report.trials_failed > 0 {
        table = table.row("Failed Trials", report.trials_failed.to_string());
    }

    table
        .row("Error Frames", report.total_error_frames.to_string())
        .row("Error Bits", format!("{}", report.total_error_bits))
        .row("Bits Transmitted (N)", format!("{}", report.total_bits))
        .row("Bit Error Rate (BER)", format_ber(report.bit_error_rate))
        .row(
            format!("Confidence Level (BER {})", format_ber(report.desired_ber)),
            format_confidence(report.confidence_level),
        )
        .row("Avg. Propagation Time", format_seconds(report.avg_propagation_secs, 3))
        .row("Avg. Link Latency", format_seconds(report.avg_travel_secs, 3))
        .row(
            "Estimated Line Speed",
            report.estimated_baudrate.map(|b| format!("{} baud", b)).unwrap_or_else(|| "-".to_string()),
        )
}

/// Truncate `text` to `width` characters, marking the cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.chars().count() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_summary(&self, report: &SessionReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Transport: {}", report.transport).map_err(fmt_err)?;
        writeln!(output, "Frame size: {} bits", report.frame_structure.frame_size()).map_err(fmt_err)?;
        writeln!(output).map_err(fmt_err)?;
        write!(output, "{}", summary_table(report).render(self.options.table_borders)).map_err(fmt_err)?;

        if self.options.show_trials && !report.trials.is_empty() {
            writeln!(output, "\n").map_err(fmt_err)?;
            for trial in &report.trials {
                writeln!(output, "{}", self.format_trial(trial)?).map_err(fmt_err)?;
            }
        }

        Ok(output)
    }

    fn format_trial(&self, trial: &TrialReport) -> Result<String> {
        let width = self.options.max_data_width;
        let mut output = String::new();

        writeln!(output, "Trial {} ({}):", trial.trial, format_seconds(trial.elapsed_secs, 3)).map_err(fmt_err)?;
        writeln!(output, "  tx >> {}", truncate(&trial.sent, width)).map_err(fmt_err)?;
        writeln!(output, "  rx >> {}", truncate(&trial.received, width)).map_err(fmt_err)?;
        write!(
            output,
            "  bytes: {}, bits: {}, error frames: {}, error bits: {}",
            trial.total_bytes, trial.total_bits, trial.error_frames, trial.error_bits
        ).map_err(fmt_err)?;

        for position in &trial.errors {
            write!(output, "\n  [{}] '{}' -> '{}'", position.index, position.sent, position.received).map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_loop_status(&self, status: LoopStatus, target: &str) -> Result<String> {
        let mark = if status.is_success() { "OK" } else { "FAIL" };
        Ok(format!("[{}] {}: {}", mark, target.trim(), status.describe()))
    }

    fn format_port_list(&self, registry: &PortRegistry) -> Result<String> {
        if registry.is_empty() {
            return Ok("No serial ports found".to_string());
        }

        let mut output = String::new();
        writeln!(output, "Available serial ports:").map_err(fmt_err)?;
        for (device, description) in registry.ports() {
            writeln!(output, "  {:<24} {}", device, description).map_err(fmt_err)?;
        }
        Ok(output.trim_end().to_string())
    }

    fn format_progress(&self, progress: f64, due_time: f64) -> String {
        format!("{} {:>5.1}%", format_due_time(due_time), (progress * 100.0).clamp(0.0, 100.0))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stats::ErrorPosition;
    use crate::types::FrameStructure;
    use chrono::Utc;

    pub(crate) fn sample_report() -> SessionReport {
        SessionReport {
            generated_at: Utc::now(),
            transport: "tcp 127.0.0.1:7".to_string(),
            frame_structure: FrameStructure::default(),
            trials_completed: 2,
            trials_failed: 0,
            total_frames_transmitted: 6,
            total_frames_received: 5,
            total_frames_lost: 1,
            total_bits: 60.0,
            total_error_frames: 2,
            total_error_bits: 11.0,
            bit_error_rate: 11.0 / 60.0,
            desired_ber: 1e-6,
            confidence_level: 0.0,
            avg_propagation_secs: 0.0125,
            avg_travel_secs: 0.0,
            avg_data_rate: 200.0,
            estimated_baudrate: Some(2400),
            trials: vec![TrialReport {
                trial: 1,
                sent: "ABCD".to_string(),
                received: "ABD".to_string(),
                elapsed_secs: 0.02,
                total_bytes: 4,
                total_bits: 40.0,
                error_frames: 1,
                error_bits: 10.0,
                errors: vec![ErrorPosition { index: 2, sent: "C".to_string(), received: String::new() }],
            }],
        }
    }

    fn plain(show_trials: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions { enable_color: false, show_trials, ..Default::default() })
    }

    #[test]
    fn test_format_seconds_steps_down() {
        assert_eq!(format_seconds(0.0, 3), "0 s");
        assert_eq!(format_seconds(1.5, 3), "1.5 s");
        assert_eq!(format_seconds(0.5, 3), "0.5 s");
        assert_eq!(format_seconds(0.0125, 3), "12.5 ms");
        assert_eq!(format_seconds(0.000_002, 3), "2 us");
        assert_eq!(format_seconds(0.000_000_003, 3), "3 ns");
        assert_eq!(format_seconds(-0.05, 3), "-50 ms");
    }

    #[test]
    fn test_format_due_time() {
        assert_eq!(format_due_time(75.3), "[ 01:15.3 ]");
        assert_eq!(format_due_time(9.0), "[ 00:09.0 ]");
        assert_eq!(format_due_time(-0.1), "[ 00:00.0 ]");
    }

    #[test]
    fn test_metric_table_render() {
        let table = MetricTable::new().row("A", "1").row("Longer", "22");
        assert_eq!(table.render(false), "A        1\nLonger  22");
        let bordered = table.render(true);
        assert!(bordered.starts_with("+--------+----+"));
        assert!(bordered.contains("| Longer | 22 |"));
    }

    #[test]
    fn test_summary_contains_metrics() {
        let output = plain(false).format_summary(&sample_report()).unwrap();
        assert!(output.contains("Transport: tcp 127.0.0.1:7"));
        assert!(output.contains("Frames Lost"));
        assert!(output.contains("1.8e-1"));
        assert!(output.contains("12.5 ms"));
        assert!(output.contains("2400 baud"));
        assert!(!output.contains("tx >>"));
    }

    #[test]
    fn test_trial_listing() {
        let output = plain(true).format_summary(&sample_report()).unwrap();
        assert!(output.contains("tx >> ABCD"));
        assert!(output.contains("rx >> ABD"));
        assert!(output.contains("[2] 'C' -> ''"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_port_list_and_status() {
        let formatter = plain(false);
        assert_eq!(formatter.format_port_list(&PortRegistry::new()).unwrap(), "No serial ports found");

        let mut registry = PortRegistry::new();
        registry.insert("COM3", "COM3 (pci)");
        assert!(formatter.format_port_list(&registry).unwrap().contains("COM3 (pci)"));

        let status = formatter.format_loop_status(LoopStatus::TimedOut, "  /dev/ttyUSB0").unwrap();
        assert_eq!(status, "[FAIL] /dev/ttyUSB0: loop check failed: timeout");
        assert_eq!(formatter.format_progress(0.5, 5.0), "[ 00:05.0 ]  50.0%");
    }
}
