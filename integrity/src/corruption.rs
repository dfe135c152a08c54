//! Corruption detection and reconstruction for opaque references.
//!
//! Detection runs a [`PatternRecognizer`] over the reference; anything above
//! the corruption threshold escalates to reconstruction. A reconstructed
//! reference stays sealed inside [`RecoveredReferenceResult`] until it passes
//! the isomorphic handshake against the digest recorded at protection time.

use aura_types::{BitVector, Threshold};
use tracing::{debug, info, warn};

use crate::frame::ProtectedFrame;
use crate::{AuthenticityResult, DEFAULT_SEGMENT_SIZE, IntegrityError, IsomorphicValidationEngine, sha256};

const SEGMENT_WEIGHT: f64 = 0.75;
const HEADER_WEIGHT: f64 = 0.95;
/// Confidence ceiling when the header geometry cannot be trusted.
const UNTRUSTED_HEADER_CONFIDENCE: f64 = 0.5;

/// What a recognizer saw in a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptionIndicators {
    pub corruption_probability: f64,
    /// The reference carries a recovery frame.
    pub framed: bool,
    pub header_intact: bool,
    pub damaged_segments: Vec<usize>,
}

pub trait PatternRecognizer: Send + Sync {
    fn analyze(&self, reference: &[u8]) -> CorruptionIndicators;
}

/// Reads the protected frame and weighs each failing checksum.
#[derive(Debug, Clone, Copy)]
pub struct FrameRecognizer {
    segment_size: usize,
}

impl Default for FrameRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl FrameRecognizer {
    #[must_use]
    pub fn new(segment_size: usize) -> Self {
        Self { segment_size }
    }
}

impl PatternRecognizer for FrameRecognizer {
    fn analyze(&self, reference: &[u8]) -> CorruptionIndicators {
        let Some(frame) = ProtectedFrame::parse(reference, self.segment_size) else {
            return CorruptionIndicators {
                corruption_probability: 0.0,
                framed: false,
                header_intact: false,
                damaged_segments: Vec::new(),
            };
        };

        let damaged_segments = frame.damaged_segments();
        let mut intact_probability = (1.0 - SEGMENT_WEIGHT).powi(damaged_segments.len() as i32);
        if !frame.header_intact() {
            intact_probability *= 1.0 - HEADER_WEIGHT;
        }
        CorruptionIndicators {
            corruption_probability: 1.0 - intact_probability,
            framed: true,
            header_intact: frame.header_intact(),
            damaged_segments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorruptionAnalysis {
    pub corruption_detected: bool,
    pub corruption_probability: f64,
    pub integrity_score: f64,
    pub reference_validity: bool,
}

/// A reconstructed reference awaiting re-validation.
///
/// The payload is only reachable through [`Self::into_validated`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredReferenceResult {
    recovered: Vec<u8>,
    expected_digest: [u8; 32],
    pub recovery_confidence: f64,
    pub repaired_segments: Vec<usize>,
    pub unrecoverable_segments: Vec<usize>,
}

/// A reconstructed reference that passed the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReference {
    pub payload: Vec<u8>,
    pub authenticity: AuthenticityResult,
}

impl RecoveredReferenceResult {
    /// Always true: reconstructed data is never trusted without a handshake.
    #[must_use]
    pub const fn validation_required(&self) -> bool {
        true
    }

    /// Compare the recovered payload's digest with the recorded one. On
    /// rejection the result is handed back with the failed handshake.
    pub fn into_validated(
        self,
        engine: &IsomorphicValidationEngine,
    ) -> Result<ValidatedReference, (Self, AuthenticityResult)> {
        let actual = BitVector::from_bytes(&sha256(&self.recovered));
        let expected = BitVector::from_bytes(&self.expected_digest);
        let authenticity = engine.validate_compatibility(&actual, &expected);
        if authenticity.is_authentic {
            Ok(ValidatedReference {
                payload: self.recovered,
                authenticity,
            })
        } else {
            Err((self, authenticity))
        }
    }

    /// Raw reconstructed bytes. Diagnostics only; not validated.
    #[must_use]
    pub fn unvalidated_bytes(&self) -> &[u8] {
        &self.recovered
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    Clean(CorruptionAnalysis),
    Reconstructed {
        analysis: CorruptionAnalysis,
        result: RecoveredReferenceResult,
    },
}

impl DetectOutcome {
    #[must_use]
    pub fn analysis(&self) -> &CorruptionAnalysis {
        match self {
            Self::Clean(analysis) | Self::Reconstructed { analysis, .. } => analysis,
        }
    }
}

pub struct CorruptionRecoverySystem {
    recognizer: Box<dyn PatternRecognizer>,
    threshold: Threshold,
    segment_size: usize,
}

impl std::fmt::Debug for CorruptionRecoverySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorruptionRecoverySystem")
            .field("threshold", &self.threshold)
            .field("segment_size", &self.segment_size)
            .finish_non_exhaustive()
    }
}

impl Default for CorruptionRecoverySystem {
    fn default() -> Self {
        Self::new(Threshold::CORRUPTION, DEFAULT_SEGMENT_SIZE)
    }
}

impl CorruptionRecoverySystem {
    #[must_use]
    pub fn new(threshold: Threshold, segment_size: usize) -> Self {
        Self {
            recognizer: Box::new(FrameRecognizer::new(segment_size)),
            threshold,
            segment_size,
        }
    }

    #[must_use]
    pub fn with_recognizer(mut self, recognizer: impl PatternRecognizer + 'static) -> Self {
        self.recognizer = Box::new(recognizer);
        self
    }

    /// Wrap a payload so later damage can be detected and repaired.
    pub fn protect(&self, payload: &[u8]) -> Result<Vec<u8>, IntegrityError> {
        ProtectedFrame::protect(payload, self.segment_size)
    }

    /// Escalates to [`Self::reconstruct`] when the corruption probability
    /// exceeds the threshold.
    pub fn detect(&self, reference: &[u8]) -> Result<DetectOutcome, IntegrityError> {
        let indicators = self.recognizer.analyze(reference);
        let probability = indicators.corruption_probability.clamp(0.0, 1.0);
        let corruption_detected = self.threshold.is_exceeded_by(probability);
        let analysis = CorruptionAnalysis {
            corruption_detected,
            corruption_probability: probability,
            integrity_score: 1.0 - probability,
            reference_validity: indicators.framed
                && indicators.header_intact
                && indicators.damaged_segments.is_empty(),
        };

        if !corruption_detected {
            debug!(probability, framed = indicators.framed, "Reference clean");
            return Ok(DetectOutcome::Clean(analysis));
        }

        warn!(
            probability,
            damaged = indicators.damaged_segments.len(),
            header_intact = indicators.header_intact,
            "Reference corruption detected; reconstructing"
        );
        let result = self.reconstruct(reference, &analysis)?;
        Ok(DetectOutcome::Reconstructed { analysis, result })
    }

    /// Rebuild the payload from the frame's segments and parity.
    pub fn reconstruct(
        &self,
        reference: &[u8],
        analysis: &CorruptionAnalysis,
    ) -> Result<RecoveredReferenceResult, IntegrityError> {
        let frame =
            ProtectedFrame::parse(reference, self.segment_size).ok_or(IntegrityError::Unframed)?;
        let reassembly = frame.reassemble();

        let total = frame.segment_count();
        let mut recovery_confidence = if total == 0 {
            0.0
        } else {
            (total - reassembly.unrecoverable.len()) as f64 / total as f64
        };
        if !frame.header_intact() {
            recovery_confidence = recovery_confidence.min(UNTRUSTED_HEADER_CONFIDENCE);
        }

        info!(
            probability = analysis.corruption_probability,
            repaired = reassembly.repaired.len(),
            unrecoverable = reassembly.unrecoverable.len(),
            recovery_confidence,
            "Reference reconstructed"
        );
        Ok(RecoveredReferenceResult {
            recovered: reassembly.payload,
            expected_digest: *frame.digest(),
            recovery_confidence,
            repaired_segments: reassembly.repaired,
            unrecoverable_segments: reassembly.unrecoverable,
        })
    }
}
