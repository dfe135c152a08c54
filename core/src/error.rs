use aura_types::{IdentityEvent, IdentityState};
use thiserror::Error;

use crate::{SealId, VectorRole};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("insufficient entropy: got {got} bytes, need at least {min}")]
    InsufficientEntropy { got: usize, min: usize },
    #[error("invalid anchor: expected {expected} bytes, got {got}")]
    InvalidAnchor { expected: usize, got: usize },
    #[error("invalid public vector: expected {expected} bytes, got {got}")]
    InvalidVector { expected: usize, got: usize },
    #[error("invalid healing vector labels: {0}")]
    InvalidLabels(&'static str),
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),
    /// Neither healing vector is membership-valid. Terminal for the identity.
    #[error("dual vector corruption: neither healing vector is membership-valid")]
    DualVectorCorruption,
    #[error("identity {seal_id} is breached; a new birth is required")]
    Breached { seal_id: SealId },
    #[error("invalid identity transition from {from} on {event:?}")]
    InvalidTransition {
        from: IdentityState,
        event: IdentityEvent,
    },
    #[error("malformed seal record: {0}")]
    MalformedRecord(String),
    #[error("malformed oracle snapshot: {0}")]
    MalformedSnapshot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SigningError {
    /// The presented vector was not derived from this anchor.
    #[error("anchor does not derive the presented {0} vector")]
    AnchorMismatch(VectorRole),
}
