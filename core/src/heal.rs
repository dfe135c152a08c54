//! Recovering a usable healing vector when one of the pair is damaged.

use serde::Serialize;
use tracing::{info, warn};

use crate::{CoreError, MembershipOracle, PublicVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealSource {
    KnownGood,
    Candidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecoveredVector {
    pub vector: PublicVector,
    pub source: HealSource,
    pub confidence: f64,
}

/// Read-only view over the oracle. Safe to share across threads.
#[derive(Debug, Clone, Copy)]
pub struct HealingCoordinator<'a> {
    oracle: &'a MembershipOracle,
}

impl<'a> HealingCoordinator<'a> {
    #[must_use]
    pub fn new(oracle: &'a MembershipOracle) -> Self {
        Self { oracle }
    }

    /// Pick whichever input the oracle still vouches for, preferring
    /// `known_good`.
    ///
    /// A valid `known_good` is returned with full confidence; a fallback to
    /// `candidate` is discounted by the oracle's false positive bound. Fails
    /// with [`CoreError::DualVectorCorruption`] when neither input is valid;
    /// that is terminal for the identity and must not be retried.
    pub fn heal(
        &self,
        known_good: &PublicVector,
        candidate: &PublicVector,
    ) -> Result<RecoveredVector, CoreError> {
        let (vector, source) = if self.oracle.is_valid(known_good) {
            (*known_good, HealSource::KnownGood)
        } else if self.oracle.is_valid(candidate) {
            (*candidate, HealSource::Candidate)
        } else {
            warn!(
                known_good = %known_good.fingerprint(),
                candidate = %candidate.fingerprint(),
                "Neither healing vector is membership-valid"
            );
            return Err(CoreError::DualVectorCorruption);
        };

        let confidence = match source {
            HealSource::KnownGood => 1.0,
            HealSource::Candidate => 1.0 - self.oracle.false_positive_bound(),
        };
        info!(
            fingerprint = %vector.fingerprint(),
            ?source,
            confidence,
            "Healing vector recovered"
        );
        Ok(RecoveredVector {
            vector,
            source,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{HealSource, HealingCoordinator};
    use crate::{CoreError, MembershipOracle, PublicVector};

    fn registered() -> (MembershipOracle, PublicVector, PublicVector) {
        let mut oracle = MembershipOracle::default();
        let a = PublicVector::from_bytes(&[0x11; 32]).unwrap();
        let b = PublicVector::from_bytes(&[0x22; 32]).unwrap();
        oracle.register(&a);
        oracle.register(&b);
        (oracle, a, b)
    }

    fn corrupted(v: &PublicVector) -> PublicVector {
        let mut bytes = *v.as_bytes();
        bytes[31] ^= 0x80;
        PublicVector::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn known_good_wins_over_corrupted_candidate() {
        let (oracle, a, _) = registered();
        let healed = HealingCoordinator::new(&oracle)
            .heal(&a, &corrupted(&a))
            .unwrap();
        assert_eq!(healed.vector, a);
        assert_eq!(healed.source, HealSource::KnownGood);
        assert!((healed.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn falls_back_to_valid_candidate() {
        let (oracle, a, b) = registered();
        let healed = HealingCoordinator::new(&oracle)
            .heal(&corrupted(&a), &b)
            .unwrap();
        assert_eq!(healed.vector, b);
        assert_eq!(healed.source, HealSource::Candidate);
        assert!(healed.confidence < 1.0 && healed.confidence > 0.99);
    }

    #[test]
    fn both_corrupted_is_terminal() {
        let (oracle, a, b) = registered();
        let err = HealingCoordinator::new(&oracle)
            .heal(&corrupted(&a), &corrupted(&b))
            .unwrap_err();
        assert!(matches!(err, CoreError::DualVectorCorruption));
    }
}
