//! Type definitions and aliases

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit
    #[default]
    #[serde(rename = "N")]
    None,
    /// Even parity
    #[serde(rename = "E")]
    Even,
    /// Odd parity
    #[serde(rename = "O")]
    Odd,
}

impl Parity {
    /// Number of parity bits this setting adds to a frame
    pub fn bits(&self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        }
    }

    /// Single-letter code (N, E, O)
    pub fn code(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Even => "Even",
            Parity::Odd => "Odd",
        }
    }
}

impl FromStr for Parity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "N" | "NONE" => Ok(Parity::None),
            "E" | "EVEN" => Ok(Parity::Even),
            "O" | "ODD" => Ok(Parity::Odd),
            other => Err(AppError::validation(format!("Parity must be one of N, E, O, got: {}", other))),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub fn bits(&self) -> u8 {
        match self {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(AppError::validation(format!("Data bits must be 7 or 8, got: {}", other))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(value: DataBits) -> Self {
        value.bits()
    }
}

impl FromStr for DataBits {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s.trim().parse()
            .map_err(|_| AppError::validation(format!("Data bits must be 7 or 8, got: {}", s)))?;
        DataBits::try_from(value)
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Number of stop bits per character
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Stop bit count; 1.5 stop bits make frame sizes fractional
    pub fn bits(&self) -> f64 {
        match self {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl TryFrom<f64> for StopBits {
    type Error = AppError;

    fn try_from(value: f64) -> Result<Self> {
        if value == 1.0 {
            Ok(StopBits::One)
        } else if value == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if value == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(AppError::validation(format!("Stop bits must be 1, 1.5 or 2, got: {}", value)))
        }
    }
}

impl From<StopBits> for f64 {
    fn from(value: StopBits) -> Self {
        value.bits()
    }
}

impl FromStr for StopBits {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let value: f64 = s.trim().parse()
            .map_err(|_| AppError::validation(format!("Stop bits must be 1, 1.5 or 2, got: {}", s)))?;
        StopBits::try_from(value)
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Bit layout of one transmitted character: start, data, parity and stop bits.
///
/// Fixed for the lifetime of a session; every byte on the wire costs
/// [`FrameStructure::frame_size`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStructure {
    pub start_bits: u8,
    pub data_bits: u8,
    pub parity_bits: u8,
    pub stop_bits: f64,
}

impl FrameStructure {
    pub fn new(start_bits: u8, data_bits: u8, parity_bits: u8, stop_bits: f64) -> Self {
        Self { start_bits, data_bits, parity_bits, stop_bits }
    }

    /// Derive the frame layout from serial framing settings (always one start bit)
    pub fn from_framing(data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        Self::new(1, data_bits.bits(), parity.bits(), stop_bits.bits())
    }

    /// Total bits per frame
    pub fn frame_size(&self) -> f64 {
        f64::from(self.start_bits) + f64::from(self.data_bits) + f64::from(self.parity_bits) + self.stop_bits
    }
}

impl Default for FrameStructure {
    fn default() -> Self {
        Self::from_framing(DataBits::default(), Parity::default(), StopBits::default())
    }
}

impl fmt::Display for FrameStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.start_bits, self.data_bits, self.parity_bits, self.stop_bits)
    }
}

/// Unit the test duration is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurationUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
}

impl DurationUnit {
    /// Convert an amount in this unit into a `Duration`
    pub fn to_duration(&self, amount: f64) -> Duration {
        let seconds = match self {
            DurationUnit::Seconds => amount,
            DurationUnit::Minutes => amount * 60.0,
        };
        Duration::from_secs_f64(seconds.max(0.0))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "m",
        }
    }
}

impl FromStr for DurationUnit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(DurationUnit::Seconds),
            "m" | "min" | "minutes" => Ok(DurationUnit::Minutes),
            other => Err(AppError::validation(format!("Duration unit must be 's' or 'm', got: {}", other))),
        }
    }
}

/// How frame lengths are chosen for each trial of a timed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    /// Every trial sends exactly the configured maximum frame length
    #[default]
    Fixed,
    /// Each trial draws a length between the minimum and maximum
    Random,
}

impl FromStr for FrameMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(FrameMode::Fixed),
            "random" => Ok(FrameMode::Random),
            other => Err(AppError::validation(format!("Frame mode must be 'fixed' or 'random', got: {}", other))),
        }
    }
}

/// Test payload content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Uniformly random characters from the pattern alphabet
    Random,
    /// The pattern alphabet repeated in order and truncated
    #[default]
    Cyclic,
}

impl FromStr for PatternKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(PatternKind::Random),
            "cyclic" => Ok(PatternKind::Cyclic),
            other => Err(AppError::validation(format!("Pattern must be 'random' or 'cyclic', got: {}", other))),
        }
    }
}
