//! Cross-validation of a data vector against a process vector.

use aura_types::{BitVector, Threshold};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticityResult {
    pub is_authentic: bool,
    /// Bitwise agreement ratio. 0.0 when the lengths differ.
    pub integrity_score: f64,
    /// Jaccard overlap of set bits. 0.0 when the lengths differ.
    pub authenticity_score: f64,
    /// The rejected pair, kept for diagnostics.
    pub offending: Option<(BitVector, BitVector)>,
}

#[derive(Debug, Clone, Copy)]
pub struct IsomorphicValidationEngine {
    coherence: Threshold,
}

impl Default for IsomorphicValidationEngine {
    fn default() -> Self {
        Self::new(Threshold::COHERENCE)
    }
}

impl IsomorphicValidationEngine {
    #[must_use]
    pub fn new(coherence: Threshold) -> Self {
        Self { coherence }
    }

    #[must_use]
    pub fn coherence(&self) -> Threshold {
        self.coherence
    }

    /// Authentic iff the lengths match and the agreement ratio meets the
    /// coherence threshold.
    #[must_use]
    pub fn validate_compatibility(
        &self,
        data: &BitVector,
        algorithm: &BitVector,
    ) -> AuthenticityResult {
        let (integrity_score, authenticity_score) =
            match (data.agreement_ratio(algorithm), data.jaccard(algorithm)) {
                (Some(agreement), Some(overlap)) => (agreement, overlap),
                _ => (0.0, 0.0),
            };
        let is_authentic = data.len() == algorithm.len() && self.coherence.is_met_by(integrity_score);

        if is_authentic {
            debug!(integrity_score, authenticity_score, "Isomorphic handshake passed");
            return AuthenticityResult {
                is_authentic,
                integrity_score,
                authenticity_score,
                offending: None,
            };
        }

        warn!(
            data_bits = data.len(),
            algorithm_bits = algorithm.len(),
            integrity_score,
            threshold = %self.coherence,
            "Isomorphic handshake rejected"
        );
        AuthenticityResult {
            is_authentic,
            integrity_score,
            authenticity_score,
            offending: Some((data.clone(), algorithm.clone())),
        }
    }
}
