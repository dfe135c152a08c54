use aura_config::ConfigError;
use aura_core::CoreError;
use aura_integrity::IntegrityError;
use aura_types::{BitVector, Threshold};
use thiserror::Error;

use crate::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// Cross-validation fell below the coherence threshold. Aborts this
    /// execution attempt only; stored state is untouched.
    #[error("authenticity validation failed: integrity score {score:.4} is below the coherence threshold")]
    AuthenticityValidation {
        data: BitVector,
        algorithm: BitVector,
        score: f64,
    },
    /// Reconstruction confidence below the recovery floor. The partial result
    /// is returned rather than discarded.
    #[error("corruption recovery failed: confidence {confidence:.4} is below the floor {floor}")]
    CorruptionRecoveryFailure {
        partial: Vec<u8>,
        confidence: f64,
        floor: Threshold,
    },
}

impl EngineError {
    /// Process exit code for a wrapping tool: 1 input, 2 verification, 3 breach.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(CoreError::Breached { .. } | CoreError::DualVectorCorruption) => 3,
            Self::AuthenticityValidation { .. } | Self::CorruptionRecoveryFailure { .. } => 2,
            Self::Core(_) | Self::Store(_) | Self::Config(_) | Self::Integrity(_) => 1,
        }
    }

    #[must_use]
    pub fn is_breach(&self) -> bool {
        self.exit_code() == 3
    }
}
