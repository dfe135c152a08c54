//! Redundant binary encodings of one logical payload.
//!
//! Each copy is the payload's bits XORed with its own repeating pattern and
//! carries a truncated SHA-256 checksum of the logical payload. Two copies
//! under different patterns never share a physical bit layout, so damage to
//! one rarely mirrors damage to the other.

use aura_types::{BitPattern, BitVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::short_checksum;

const ENCODING_DOMAIN: &[u8] = b"aura-seal:encoding:v1";

/// Largest number of disagreeing positions resolved by exhaustive search.
pub const MAX_SEARCH_BITS: usize = 12;

/// Fixed patterns for data (primary/secondary) and process descriptors
/// (execution/context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingPatterns {
    pub data_primary: BitPattern,
    pub data_secondary: BitPattern,
    pub algorithm_execution: BitPattern,
    pub algorithm_context: BitPattern,
}

impl Default for EncodingPatterns {
    fn default() -> Self {
        Self {
            data_primary: BitPattern::from_array([false, true, false, true]),
            data_secondary: BitPattern::from_array([true, true, true, false]),
            algorithm_execution: BitPattern::from_array([true, true, true, false]),
            algorithm_context: BitPattern::from_array([true, false, false, false]),
        }
    }
}

fn payload_checksum(logical: &BitVector) -> [u8; 8] {
    let len = (logical.len() as u64).to_be_bytes();
    short_checksum(ENCODING_DOMAIN, &[&len, logical.as_bytes()])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVector {
    bits: BitVector,
    checksum: [u8; 8],
}

impl EncodedVector {
    fn encode(logical: &BitVector, pattern: &BitPattern) -> Self {
        Self {
            bits: logical.xor_pattern(pattern),
            checksum: payload_checksum(logical),
        }
    }

    #[must_use]
    pub fn bits(&self) -> &BitVector {
        &self.bits
    }

    /// Raw access for transports that carry the bits separately.
    pub fn bits_mut(&mut self) -> &mut BitVector {
        &mut self.bits
    }

    #[must_use]
    pub fn checksum(&self) -> &[u8; 8] {
        &self.checksum
    }

    pub fn checksum_mut(&mut self) -> &mut [u8; 8] {
        &mut self.checksum
    }
}

/// Two independent encodings of one payload, plus the patterns needed to
/// decode them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingPair {
    primary: EncodedVector,
    secondary: EncodedVector,
    pattern_a: BitPattern,
    pattern_b: BitPattern,
}

impl EncodingPair {
    fn build(logical: &BitVector, pattern_a: &BitPattern, pattern_b: &BitPattern) -> Self {
        Self {
            primary: EncodedVector::encode(logical, pattern_a),
            secondary: EncodedVector::encode(logical, pattern_b),
            pattern_a: pattern_a.clone(),
            pattern_b: pattern_b.clone(),
        }
    }

    #[must_use]
    pub fn primary(&self) -> &EncodedVector {
        &self.primary
    }

    #[must_use]
    pub fn secondary(&self) -> &EncodedVector {
        &self.secondary
    }

    pub fn primary_mut(&mut self) -> &mut EncodedVector {
        &mut self.primary
    }

    pub fn secondary_mut(&mut self) -> &mut EncodedVector {
        &mut self.secondary
    }

    #[must_use]
    pub fn decode_primary(&self) -> BitVector {
        self.primary.bits.xor_pattern(&self.pattern_a)
    }

    #[must_use]
    pub fn decode_secondary(&self) -> BitVector {
        self.secondary.bits.xor_pattern(&self.pattern_b)
    }

    /// Agreement ratio of the two raw (still patterned) vectors.
    #[must_use]
    pub fn raw_agreement(&self) -> f64 {
        self.primary
            .bits
            .agreement_ratio(&self.secondary.bits)
            .unwrap_or(0.0)
    }

    fn matches_any_checksum(&self, logical: &BitVector) -> bool {
        let sum = payload_checksum(logical);
        sum == self.primary.checksum || sum == self.secondary.checksum
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossValidationMatrix {
    pub corruption_detected: bool,
    pub validation_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryResult {
    /// Freshly re-encoded pair built from the recovered payload.
    pub recovered: EncodingPair,
    pub logical: BitVector,
    pub recovery_confidence: f64,
    /// The recovered payload matches a stored checksum.
    pub verified: bool,
    pub repaired_bits: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid {
        matrix: CrossValidationMatrix,
        logical: BitVector,
    },
    Recovered(RecoveryResult),
}

impl ValidationOutcome {
    #[must_use]
    pub fn logical(&self) -> &BitVector {
        match self {
            Self::Valid { logical, .. } => logical,
            Self::Recovered(result) => &result.logical,
        }
    }

    /// Validation score when clean, recovery confidence otherwise.
    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Valid { matrix, .. } => matrix.validation_score,
            Self::Recovered(result) => result.recovery_confidence,
        }
    }

    #[must_use]
    pub fn corruption_detected(&self) -> bool {
        matches!(self, Self::Recovered(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinaryEncodingProcessor {
    patterns: EncodingPatterns,
}

impl BinaryEncodingProcessor {
    #[must_use]
    pub fn new(patterns: EncodingPatterns) -> Self {
        Self { patterns }
    }

    #[must_use]
    pub fn patterns(&self) -> &EncodingPatterns {
        &self.patterns
    }

    /// Deterministic: the same payload and patterns always give a
    /// bit-identical pair.
    #[must_use]
    pub fn encode(
        &self,
        payload: &[u8],
        pattern_a: &BitPattern,
        pattern_b: &BitPattern,
    ) -> EncodingPair {
        EncodingPair::build(&BitVector::from_bytes(payload), pattern_a, pattern_b)
    }

    #[must_use]
    pub fn validate(&self, pair: &EncodingPair) -> ValidationOutcome {
        let primary = pair.decode_primary();
        let secondary = pair.decode_secondary();
        let primary_ok = payload_checksum(&primary) == pair.primary.checksum;
        let secondary_ok = payload_checksum(&secondary) == pair.secondary.checksum;

        if primary_ok && secondary_ok {
            let validation_score = primary.agreement_ratio(&secondary).unwrap_or(0.0);
            debug!(validation_score, bits = primary.len(), "Encoding pair validated");
            return ValidationOutcome::Valid {
                matrix: CrossValidationMatrix {
                    corruption_detected: false,
                    validation_score,
                },
                logical: primary,
            };
        }

        debug!(primary_ok, secondary_ok, "Encoding checksum failed; recovering");
        ValidationOutcome::Recovered(self.recover(pair))
    }

    /// Rebuild the pair from whatever redundancy survives.
    ///
    /// One intact copy is authoritative. With both damaged, positions where
    /// the copies agree are kept and up to [`MAX_SEARCH_BITS`] disagreeing
    /// positions are searched against the stored checksums. Confidence is the
    /// share of corroborated positions, or 1.0 when a checksum confirms the
    /// result.
    #[must_use]
    pub fn recover(&self, pair: &EncodingPair) -> RecoveryResult {
        let primary = pair.decode_primary();
        let secondary = pair.decode_secondary();

        if pair.matches_any_checksum(&primary) {
            return rebuilt(pair, primary, 1.0, true);
        }
        if pair.matches_any_checksum(&secondary) {
            return rebuilt(pair, secondary, 1.0, true);
        }

        let Some(disagreements) = disagreeing_positions(&primary, &secondary) else {
            warn!(
                primary = primary.len(),
                secondary = secondary.len(),
                "Encoding copies differ in length; nothing to align"
            );
            return rebuilt(pair, primary, 0.0, false);
        };

        if disagreements.len() <= MAX_SEARCH_BITS
            && let Some(found) = search(pair, &primary, &secondary, &disagreements)
        {
            return rebuilt(pair, found, 1.0, true);
        }

        let total = primary.len();
        let confidence = if total == 0 {
            0.0
        } else {
            (total - disagreements.len()) as f64 / total as f64
        };
        warn!(
            disagreements = disagreements.len(),
            confidence, "Encoding recovered without checksum confirmation"
        );
        rebuilt(pair, primary, confidence, false)
    }
}

fn disagreeing_positions(a: &BitVector, b: &BitVector) -> Option<Vec<usize>> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b.iter())
            .enumerate()
            .filter_map(|(index, (x, y))| (x != y).then_some(index))
            .collect(),
    )
}

/// Try every assignment of the disagreeing positions.
fn search(
    pair: &EncodingPair,
    primary: &BitVector,
    secondary: &BitVector,
    positions: &[usize],
) -> Option<BitVector> {
    let mut candidate = primary.clone();
    for mask in 0u32..(1 << positions.len()) {
        for (bit, &index) in positions.iter().enumerate() {
            let from = if mask & (1 << bit) == 0 { primary } else { secondary };
            let value = from.get(index)?;
            candidate.set(index, value).ok()?;
        }
        if pair.matches_any_checksum(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn rebuilt(
    pair: &EncodingPair,
    logical: BitVector,
    recovery_confidence: f64,
    verified: bool,
) -> RecoveryResult {
    let recovered = EncodingPair::build(&logical, &pair.pattern_a, &pair.pattern_b);
    let repaired_bits = [
        (&pair.primary.bits, &recovered.primary.bits),
        (&pair.secondary.bits, &recovered.secondary.bits),
    ]
    .iter()
    .map(|(old, new)| old.hamming_distance(new).unwrap_or(new.len()))
    .sum();

    RecoveryResult {
        recovered,
        logical,
        recovery_confidence,
        verified,
        repaired_bits,
    }
}

#[cfg(test)]
mod tests {
    use aura_types::BitVector;

    use super::{BinaryEncodingProcessor, EncodingPair, ValidationOutcome};

    const PAYLOAD: &[u8] = b"{symbol: 'na', meaning: 'and'}";

    fn data_pair() -> (BinaryEncodingProcessor, EncodingPair) {
        let processor = BinaryEncodingProcessor::default();
        let p = processor.patterns().clone();
        let pair = processor.encode(PAYLOAD, &p.data_primary, &p.data_secondary);
        (processor, pair)
    }

    fn original() -> BitVector {
        BitVector::from_bytes(PAYLOAD)
    }

    #[test]
    fn encoding_is_deterministic() {
        let (_, a) = data_pair();
        let (_, b) = data_pair();
        assert_eq!(a, b);
    }

    #[test]
    fn copies_differ_physically_but_decode_identically() {
        let (_, pair) = data_pair();
        assert_ne!(pair.primary().bits(), pair.secondary().bits());
        assert_eq!(pair.decode_primary(), pair.decode_secondary());
        assert!(pair.raw_agreement() < 1.0);
    }

    #[test]
    fn clean_pair_validates_with_full_score() {
        let (processor, pair) = data_pair();
        match processor.validate(&pair) {
            ValidationOutcome::Valid { matrix, logical } => {
                assert!(!matrix.corruption_detected);
                assert!((matrix.validation_score - 1.0).abs() < f64::EPSILON);
                assert_eq!(logical, original());
            }
            other @ ValidationOutcome::Recovered(_) => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn damaged_copy_is_rebuilt_from_its_sibling() {
        let (processor, mut pair) = data_pair();
        for index in [0, 17, 100] {
            pair.primary_mut().bits_mut().flip(index).unwrap();
        }

        let outcome = processor.validate(&pair);
        let ValidationOutcome::Recovered(result) = outcome else {
            panic!("expected recovery");
        };
        assert!(result.verified);
        assert_eq!(result.logical, original());
        assert_eq!(result.repaired_bits, 3);
        assert!((result.recovery_confidence - 1.0).abs() < f64::EPSILON);
        assert!(!processor.validate(&result.recovered).corruption_detected());
    }

    #[test]
    fn damaged_checksum_alone_is_repaired() {
        let (processor, mut pair) = data_pair();
        pair.secondary_mut().checksum_mut()[0] ^= 0xff;

        let result = processor.recover(&pair);
        assert!(result.verified);
        assert_eq!(result.logical, original());
        assert_eq!(result.repaired_bits, 0);
    }

    #[test]
    fn both_copies_damaged_within_search_budget() {
        let (processor, mut pair) = data_pair();
        for index in [3, 40, 77, 150, 200] {
            pair.primary_mut().bits_mut().flip(index).unwrap();
        }
        for index in [9, 61, 123, 180, 231] {
            pair.secondary_mut().bits_mut().flip(index).unwrap();
        }

        let result = processor.recover(&pair);
        assert!(result.verified);
        assert_eq!(result.logical, original());
    }

    #[test]
    fn heavy_damage_reports_partial_confidence() {
        let (processor, mut pair) = data_pair();
        for index in (0..20).map(|i| i * 11) {
            pair.primary_mut().bits_mut().flip(index).unwrap();
        }
        pair.secondary_mut().bits_mut().flip(5).unwrap();

        let result = processor.recover(&pair);
        assert!(!result.verified);
        let total = original().len() as f64;
        assert!((result.recovery_confidence - (total - 21.0) / total).abs() < 1e-9);
        assert_ne!(result.logical, original());
    }

    #[test]
    fn empty_payload_validates() {
        let processor = BinaryEncodingProcessor::default();
        let p = processor.patterns().clone();
        let pair = processor.encode(b"", &p.data_primary, &p.data_secondary);
        assert!(!processor.validate(&pair).corruption_detected());
    }
}
