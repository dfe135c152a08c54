//! Integrity cross-validation and recovery.
//!
//! ```text
//! payload ──encode──> EncodingPair (primary ⊕ pattern_a, secondary ⊕ pattern_b)
//!                         │ validate: checksum both, score agreement
//!                         └─ recover: rebuild from the intact copy, or
//!                                     search the disagreeing bits
//!
//! reference ──protect──> frame (header + segments + XOR parity)
//!                         │ detect: pattern recognition -> probability
//!                         └─ reconstruct -> RecoveredReferenceResult
//!                                           └─ into_validated(engine)
//!
//! (data, process) ──IsomorphicValidationEngine──> AuthenticityResult
//!                 ──ExecutionCoordinateMapper───> ExecutionCoordinate
//! ```
//!
//! All operations are pure and synchronous.

mod coordinate;
mod corruption;
mod descriptor;
mod encoding;
mod error;
mod frame;
mod isomorphic;

pub use coordinate::{ExecutionCoordinate, ExecutionCoordinateMapper};
pub use corruption::{
    CorruptionAnalysis, CorruptionIndicators, CorruptionRecoverySystem, DetectOutcome,
    FrameRecognizer, PatternRecognizer, RecoveredReferenceResult, ValidatedReference,
};
pub use descriptor::{AlgorithmEncoding, DataEncoding, ProcessDescriptor};
pub use encoding::{
    BinaryEncodingProcessor, CrossValidationMatrix, EncodedVector, EncodingPair,
    EncodingPatterns, RecoveryResult, ValidationOutcome,
};
pub use error::IntegrityError;
pub use frame::{DEFAULT_SEGMENT_SIZE, ProtectedFrame};
pub use isomorphic::{AuthenticityResult, IsomorphicValidationEngine};

use sha2::{Digest, Sha256};

/// First eight bytes of SHA-256 over a domain tag and the parts, in order.
pub(crate) fn short_checksum(domain: &[u8], parts: &[&[u8]]) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub(crate) fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}
