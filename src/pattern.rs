//! Test payload generation

use crate::defaults::{DEFAULT_FRAME_MAX_LIMIT, DEFAULT_FRAME_MIN_LIMIT};
use crate::types::PatternKind;
use rand::Rng;

/// Characters test payloads are drawn from: `[A-Za-z0-9_]`
pub const PATTERN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_";

/// Produces test payloads of a given or randomized length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternGenerator {
    kind: PatternKind,
    min_length: usize,
    max_length: usize,
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self::new(PatternKind::default())
    }
}

impl PatternGenerator {
    /// Generator bounded to the default frame length limits
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            min_length: DEFAULT_FRAME_MIN_LIMIT,
            max_length: DEFAULT_FRAME_MAX_LIMIT,
        }
    }

    /// Set the range random lengths are drawn from. Bounds are clamped to at
    /// least one byte and swapped if given in the wrong order.
    pub fn with_bounds(mut self, min_length: usize, max_length: usize) -> Self {
        let (low, high) = if min_length <= max_length {
            (min_length, max_length)
        } else {
            (max_length, min_length)
        };
        self.min_length = low.max(1);
        self.max_length = high.max(1);
        self
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.min_length, self.max_length)
    }

    /// Generate a payload of `length` bytes, or of a random length within the
    /// configured bounds when `length` is `None`.
    pub fn generate(&self, length: Option<usize>) -> Vec<u8> {
        self.generate_with(&mut rand::rng(), length)
    }

    /// Same as [`PatternGenerator::generate`] with a caller-supplied RNG
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, length: Option<usize>) -> Vec<u8> {
        let length = length.unwrap_or_else(|| self.random_length(rng));
        match self.kind {
            PatternKind::Random => random_pattern(rng, length),
            PatternKind::Cyclic => cyclic_pattern(length),
        }
    }

    /// Draw a length uniformly from the configured bounds
    pub fn random_length<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(self.min_length..=self.max_length)
    }
}

/// The pattern alphabet repeated in order and truncated to `length`
pub fn cyclic_pattern(length: usize) -> Vec<u8> {
    PATTERN_ALPHABET.iter().copied().cycle().take(length).collect()
}

/// `length` characters drawn uniformly from the pattern alphabet
pub fn random_pattern<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Vec<u8> {
    (0..length)
        .map(|_| PATTERN_ALPHABET[rng.random_range(0..PATTERN_ALPHABET.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_alphabet() {
        assert_eq!(PATTERN_ALPHABET.len(), 63);
        assert!(PATTERN_ALPHABET.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_'));
    }

    #[test]
    fn test_cyclic_pattern_wraps() {
        let pattern = cyclic_pattern(65);
        assert_eq!(pattern.len(), 65);
        assert_eq!(&pattern[..3], b"ABC");
        assert_eq!(pattern[62], b'_');
        assert_eq!(&pattern[63..], b"AB");
        assert!(cyclic_pattern(0).is_empty());
    }

    #[test]
    fn test_random_pattern_stays_in_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        let pattern = random_pattern(&mut rng, 500);
        assert_eq!(pattern.len(), 500);
        assert!(pattern.iter().all(|b| PATTERN_ALPHABET.contains(b)));
    }

    #[test]
    fn test_explicit_length_is_honoured() {
        let generator = PatternGenerator::new(PatternKind::Random);
        assert_eq!(generator.generate(Some(17)).len(), 17);
        assert_eq!(PatternGenerator::default().generate(Some(4)), b"ABCD".to_vec());
    }

    #[test]
    fn test_random_length_within_bounds() {
        let generator = PatternGenerator::new(PatternKind::Cyclic).with_bounds(5, 9);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let length = generator.generate_with(&mut rng, None).len();
            assert!((5..=9).contains(&length));
        }
    }

    #[test]
    fn test_bounds_are_normalised() {
        let generator = PatternGenerator::default().with_bounds(10, 0);
        assert_eq!(generator.bounds(), (1, 10));
        assert_eq!(PatternGenerator::default().bounds(), (1, 1024));
    }
}
