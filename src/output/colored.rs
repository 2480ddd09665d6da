//! Colored formatter with terminal color support

use super::formatter::{
    format_ber, format_confidence, format_due_time, format_seconds, summary_table, truncate,
    FormattingOptions, OutputFormatter, PlainFormatter,
};
use crate::{
    error::Result,
    executor::LoopStatus,
    ports::PortRegistry,
    stats::{SessionReport, TrialReport},
};
use colored::*;

/// Link quality classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkQuality {
    /// Every byte came back intact
    Clean,
    /// Errors seen, but the measured BER meets the target
    WithinTarget,
    /// Measured BER is above the target
    Degraded,
    /// Nothing came back at all
    Dead,
}

impl LinkQuality {
    pub fn from_report(report: &SessionReport) -> Self {
        if report.total_frames_transmitted > 0 && report.total_frames_received == 0 {
            Self::Dead
        } else if report.is_error_free() {
            Self::Clean
        } else if report.bit_error_rate <= report.desired_ber {
            Self::WithinTarget
        } else {
            Self::Degraded
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Clean => Color::Green,
            Self::WithinTarget => Color::Cyan,
            Self::Degraded => Color::Yellow,
            Self::Dead => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::WithinTarget => "Within target",
            Self::Degraded => "Degraded",
            Self::Dead => "No echo",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn emphasize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color).bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn confidence_color(&self, level: f64) -> Color {
        if level >= 0.95 {
            self.color_scheme.success
        } else if level >= 0.63 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(title.chars().count() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_summary(&self, report: &SessionReport) -> Result<String> {
        let quality = LinkQuality::from_report(report);
        let mut lines = vec![
            format!("{} {}", self.dimmed("Transport:"), report.transport),
            format!("{} {} bits", self.dimmed("Frame size:"), report.frame_structure.frame_size()),
            format!("{} {}", self.dimmed("Link:"), self.emphasize(quality.description(), quality.color())),
            String::new(),
        ];

        let table = summary_table(report);
        let label_width = table.rows().iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

        for (label, value) in table.rows() {
            let value = if label.starts_with("Bit Error Rate") {
                self.emphasize(value, quality.color())
            } else if label.starts_with("Confidence Level") {
                self.colorize(value, self.confidence_color(report.confidence_level))
            } else if label.starts_with("Frames Lost") && report.total_frames_lost != 0 {
                self.colorize(value, self.color_scheme.warning)
            } else if label.starts_with("Failed Trials") {
                self.colorize(value, self.color_scheme.error)
            } else {
                value.normal()
            };
            lines.push(format!("  {:<width$}  {}", label, value, width = label_width));
        }

        if self.options.show_trials && !report.trials.is_empty() {
            lines.push(String::new());
            for trial in &report.trials {
                lines.push(self.format_trial(trial)?);
            }
        }

        Ok(lines.join("\n"))
    }

    fn format_trial(&self, trial: &TrialReport) -> Result<String> {
        let width = self.options.max_data_width;
        let clean = trial.errors.is_empty();

        let mut lines = vec![
            format!(
                "{} {}",
                self.bold(&format!("Trial {}", trial.trial)),
                self.dimmed(&format!("({})", format_seconds(trial.elapsed_secs, 3)))
            ),
            format!("  {} {}", self.colorize("tx >>", self.color_scheme.info), truncate(&trial.sent, width)),
            format!(
                "  {} {}",
                self.colorize("rx >>", if clean { self.color_scheme.success } else { self.color_scheme.warning }),
                truncate(&trial.received, width)
            ),
            format!(
                "  {}",
                self.dimmed(&format!(
                    "bytes: {}, bits: {}, error frames: {}, error bits: {}",
                    trial.total_bytes, trial.total_bits, trial.error_frames, trial.error_bits
                ))
            ),
        ];

        for position in &trial.errors {
            lines.push(format!(
                "  [{}] '{}' -> '{}'",
                position.index,
                self.colorize(&position.sent, self.color_scheme.success),
                self.colorize(&position.received, self.color_scheme.error)
            ));
        }

        Ok(lines.join("\n"))
    }

    fn format_loop_status(&self, status: LoopStatus, target: &str) -> Result<String> {
        let (mark, color) = if status.is_success() {
            ("✓", self.color_scheme.success)
        } else {
            ("✗", self.color_scheme.error)
        };
        Ok(format!("{} {}: {}", self.colorize(mark, color), target.trim(), self.colorize(status.describe(), color)))
    }

    fn format_port_list(&self, registry: &PortRegistry) -> Result<String> {
        if registry.is_empty() {
            return Ok(self.colorize("No serial ports found", self.color_scheme.muted).to_string());
        }

        let mut lines = vec![self.bold("Available serial ports:").to_string()];
        for (device, description) in registry.ports() {
            lines.push(format!("  {:<24} {}", self.colorize(device, self.color_scheme.info), self.dimmed(description)));
        }
        Ok(lines.join("\n"))
    }

    fn format_progress(&self, progress: f64, due_time: f64) -> String {
        const WIDTH: usize = 20;
        let ratio = progress.clamp(0.0, 1.0);
        let filled = (ratio * WIDTH as f64) as usize;

        if !self.options.enable_color {
            return self.plain.format_progress(progress, due_time);
        }

        format!(
            "{} [{}{}] {:>5.1}%",
            format_due_time(due_time),
            "█".repeat(filled).color(self.color_scheme.info),
            "░".repeat(WIDTH - filled).color(self.color_scheme.muted),
            ratio * 100.0
        )
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("✗ Error:", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("⚠ Warning:", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("✓", self.color_scheme.success), message))
    }
}

/// BER and confidence as one colored line, for progress updates
pub fn quick_summary(report: &SessionReport, use_color: bool) -> String {
    let text = format!(
        "{} trials, BER {}, CL {}",
        report.trials_completed,
        format_ber(report.bit_error_rate),
        format_confidence(report.confidence_level)
    );
    if use_color {
        text.color(LinkQuality::from_report(report).color()).to_string()
    } else {
        text
    }
}
