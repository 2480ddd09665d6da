//! One loopback trial and its derived error statistics

use crate::compare::{self, ErrorMap};
use crate::types::FrameStructure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sent and received data of one echo trial plus the statistics derived
/// from them. Built once per completed trial and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackSample {
    sent: Vec<u8>,
    received: Vec<u8>,
    elapsed: Duration,
    frame: FrameStructure,
    error_map: ErrorMap,
    total_error_bits: f64,
}

impl LoopbackSample {
    pub fn new(sent: Vec<u8>, received: Vec<u8>, elapsed: Duration, frame: FrameStructure) -> Self {
        let error_map = compare::compare(&sent, &received);
        let total_error_bits = compare::total_bit_errors(&error_map, frame.frame_size());

        Self {
            sent,
            received,
            elapsed,
            frame,
            error_map,
            total_error_bits,
        }
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Time from the start of the write until the echo completed or timed out
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn frame_structure(&self) -> FrameStructure {
        self.frame
    }

    pub fn error_map(&self) -> &ErrorMap {
        &self.error_map
    }

    pub fn frame_size(&self) -> f64 {
        self.frame.frame_size()
    }

    pub fn total_bytes(&self) -> usize {
        self.sent.len()
    }

    /// One frame per sent byte
    pub fn total_frames(&self) -> usize {
        self.total_bytes()
    }

    pub fn total_bits(&self) -> f64 {
        self.total_bytes() as f64 * self.frame_size()
    }

    pub fn total_error_frames(&self) -> usize {
        self.error_map.len()
    }

    pub fn total_error_bits(&self) -> f64 {
        self.total_error_bits
    }

    /// Received bytes per second, zero when no time elapsed
    pub fn data_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.received.len() as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether the echo came back with a different length than was sent
    pub fn is_length_mismatch(&self) -> bool {
        self.sent.len() != self.received.len()
    }

    /// Whether the echo came back byte-identical
    pub fn is_clean(&self) -> bool {
        self.error_map.is_empty() && !self.is_length_mismatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ByteDiff;

    fn frame_8n1() -> FrameStructure {
        FrameStructure::new(1, 8, 0, 1.0)
    }

    #[test]
    fn test_clean_echo() {
        let sample = LoopbackSample::new(b"AAAA".to_vec(), b"AAAA".to_vec(), Duration::from_millis(10), frame_8n1());
        assert_eq!(sample.total_bytes(), 4);
        assert_eq!(sample.total_frames(), 4);
        assert_eq!(sample.total_bits(), 40.0);
        assert_eq!(sample.total_error_bits(), 0.0);
        assert_eq!(sample.total_error_frames(), 0);
        assert!(sample.is_clean());
    }

    #[test]
    fn test_single_substitution() {
        let sample = LoopbackSample::new(b"AB".to_vec(), b"AC".to_vec(), Duration::from_millis(10), frame_8n1());
        assert_eq!(sample.error_map().len(), 1);
        assert_eq!(sample.error_map()[&1], ByteDiff::substituted(b'B', b'C'));
        assert_eq!(sample.total_error_bits(), f64::from((b'B' ^ b'C').count_ones()));
        assert_eq!(sample.total_error_frames(), 1);
    }

    #[test]
    fn test_timed_out_trial_counts_everything_lost() {
        let sample = LoopbackSample::new(b"hello".to_vec(), Vec::new(), Duration::from_secs(3), frame_8n1());
        assert!(sample.is_length_mismatch());
        assert_eq!(sample.total_error_frames(), 5);
        assert_eq!(sample.total_error_bits(), 50.0);
        assert_eq!(sample.data_rate(), 0.0);
    }

    #[test]
    fn test_data_rate() {
        let sample = LoopbackSample::new(vec![b'x'; 100], vec![b'x'; 100], Duration::from_millis(500), frame_8n1());
        assert!((sample.data_rate() - 200.0).abs() < 1e-9);

        let instant = LoopbackSample::new(b"x".to_vec(), b"x".to_vec(), Duration::ZERO, frame_8n1());
        assert_eq!(instant.data_rate(), 0.0);
    }

    #[test]
    fn test_fractional_frame_size() {
        let frame = FrameStructure::new(1, 8, 1, 1.5);
        let sample = LoopbackSample::new(b"ab".to_vec(), b"a".to_vec(), Duration::from_millis(1), frame);
        assert_eq!(sample.total_bits(), 23.0);
        assert_eq!(sample.total_error_bits(), 11.5);
    }
}
