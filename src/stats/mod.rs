//! Error statistics: BER policy, baud-rate inference, confidence level and
//! the serialisable session report

use crate::{
    compare::ByteDiff,
    defaults::BAUD_RATES,
    executor::TestSession,
    models::LoopbackSample,
    types::FrameStructure,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bit error rate of a run.
///
/// A run without errors never reports an exact zero: the next untested bit
/// is assumed to be the first error, giving `1 / (total_bits + 1)`. With no
/// bits at all the rate is zero.
pub fn bit_error_rate(total_error_bits: f64, total_bits: f64) -> f64 {
    if total_error_bits > 0.0 {
        total_error_bits / total_bits
    } else if total_bits > 0.0 {
        1.0 / (total_bits + 1.0)
    } else {
        0.0
    }
}

/// Infer the nominal line speed from an observed data rate in bytes/second.
///
/// Returns the smallest standard baud rate that is at least
/// `data_rate * frame_size`, clamped to the ends of the table, or `None`
/// when nothing was received.
pub fn estimate_baudrate(data_rate: f64, frame_size: f64) -> Option<u32> {
    if !data_rate.is_finite() || data_rate <= 0.0 {
        return None;
    }
    snap_to_table(data_rate * frame_size, BAUD_RATES)
}

/// Bracketing search from the middle of an ascending table
fn snap_to_table(bps: f64, table: &[u32]) -> Option<u32> {
    match table.len() {
        0 => return None,
        1 => return Some(table[0]),
        _ => {}
    }

    let mut upper = table.len() / 2;
    let mut lower = upper - 1;
    loop {
        let (low, high) = (f64::from(table[lower]), f64::from(table[upper]));
        if bps > low && bps <= high {
            return Some(table[upper]);
        } else if bps <= low {
            if lower == 0 {
                return Some(table[lower]);
            }
            upper = lower;
            lower -= 1;
        } else {
            if upper + 1 == table.len() {
                return Some(table[upper]);
            }
            lower = upper;
            upper += 1;
        }
    }
}

/// Poisson cumulative distribution `P(X <= floor(k))` for mean `lambda`.
///
/// Terms are accumulated in log space so large means do not underflow.
/// For `k > lambda + 40 * sqrt(lambda) + 40` the result is exactly 1.0
/// without summing: the tail past that point is far below f64 resolution.
pub fn poisson_cdf(k: f64, lambda: f64) -> f64 {
    if k.is_nan() || lambda.is_nan() || k < 0.0 {
        return 0.0;
    }
    if lambda <= 0.0 || k.is_infinite() {
        return 1.0;
    }

    let k = k.floor();
    // Far beyond the mean the remaining tail is below f64 resolution
    if k > lambda + 40.0 * lambda.sqrt() + 40.0 {
        return 1.0;
    }

    let ln_lambda = lambda.ln();
    let mut log_term = -lambda;
    let mut log_sum = log_term;
    let mut i = 1.0;
    while i <= k {
        log_term += ln_lambda - f64::ln(i);
        let (hi, lo) = if log_sum > log_term { (log_sum, log_term) } else { (log_term, log_sum) };
        log_sum = hi + (lo - hi).exp().ln_1p();
        i += 1.0;
    }

    log_sum.exp().clamp(0.0, 1.0)
}

/// Confidence that a link meets `ber_target`, given `total_bits` observed
/// with `error_bits` errors: `1 - PoissonCDF(error_bits; total_bits * ber_target)`.
pub fn confidence_level(total_bits: f64, ber_target: f64, error_bits: f64) -> f64 {
    1.0 - poisson_cdf(error_bits, total_bits * ber_target)
}

/// One mismatched position, rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPosition {
    pub index: usize,
    /// Sent character, empty when the byte was line noise
    pub sent: String,
    /// Received character, empty when the byte was lost
    pub received: String,
}

impl ErrorPosition {
    fn from_diff(index: usize, diff: &ByteDiff) -> Self {
        Self {
            index,
            sent: diff.sent_text(),
            received: diff.received_text(),
        }
    }
}

/// Per-trial section of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial: usize,
    pub sent: String,
    pub received: String,
    pub elapsed_secs: f64,
    pub total_bytes: usize,
    pub total_bits: f64,
    pub error_frames: usize,
    pub error_bits: f64,
    pub errors: Vec<ErrorPosition>,
}

impl TrialReport {
    pub fn from_sample(trial: usize, sample: &LoopbackSample) -> Self {
        Self {
            trial,
            sent: String::from_utf8_lossy(sample.sent()).into_owned(),
            received: String::from_utf8_lossy(sample.received()).into_owned(),
            elapsed_secs: sample.elapsed().as_secs_f64(),
            total_bytes: sample.total_bytes(),
            total_bits: sample.total_bits(),
            error_frames: sample.total_error_frames(),
            error_bits: sample.total_error_bits(),
            errors: sample.error_map()
                .iter()
                .map(|(index, diff)| ErrorPosition::from_diff(*index, diff))
                .collect(),
        }
    }
}

/// Statistics object handed to the reporting layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Utc>,
    pub transport: String,
    pub frame_structure: FrameStructure,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub total_frames_transmitted: usize,
    pub total_frames_received: usize,
    pub total_frames_lost: i64,
    pub total_bits: f64,
    pub total_error_frames: usize,
    pub total_error_bits: f64,
    pub bit_error_rate: f64,
    pub desired_ber: f64,
    pub confidence_level: f64,
    pub avg_propagation_secs: f64,
    pub avg_travel_secs: f64,
    pub avg_data_rate: f64,
    pub estimated_baudrate: Option<u32>,
    pub trials: Vec<TrialReport>,
}

impl SessionReport {
    /// Snapshot the aggregates of `session` against a target BER
    pub fn from_session(session: &TestSession, transport: impl Into<String>, desired_ber: f64) -> Self {
        Self {
            generated_at: Utc::now(),
            transport: transport.into(),
            frame_structure: session.frame_structure(),
            trials_completed: session.counter(),
            trials_failed: session.failed_trials(),
            total_frames_transmitted: session.total_frames_transmitted(),
            total_frames_received: session.total_frames_received(),
            total_frames_lost: session.total_frames_lost(),
            total_bits: session.total_bits(),
            total_error_frames: session.total_error_frames(),
            total_error_bits: session.total_error_bits(),
            bit_error_rate: session.bit_error_rate(),
            desired_ber,
            confidence_level: confidence_level(session.total_bits(), desired_ber, session.total_error_bits()),
            avg_propagation_secs: session.avg_propagation_time(),
            avg_travel_secs: session.avg_travel_time(),
            avg_data_rate: session.avg_data_rate(),
            estimated_baudrate: session.estimated_baudrate(),
            trials: session.samples()
                .iter()
                .enumerate()
                .map(|(i, sample)| TrialReport::from_sample(i + 1, sample))
                .collect(),
        }
    }

    /// Whether every trial came back byte-identical
    pub fn is_error_free(&self) -> bool {
        self.total_error_frames == 0 && self.total_frames_lost == 0 && self.trials_failed == 0
    }
}
