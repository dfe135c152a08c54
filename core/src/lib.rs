//! Dual-vector sealing core.
//!
//! One private anchor, two public healing vectors. Each vector is the
//! verifying key of an independent co-signing key derived from the anchor, so
//! either vector alone can re-establish verification when its sibling is lost.
//!
//! ```text
//! entropy --derive--> anchor --KDF(label α)--> co-signer α --> vector α
//!                            \-KDF(label β)--> co-signer β --> vector β
//!
//! seal(payload)   = digest + sig_α + sig_β + fp(α) + fp(β)
//! verify(α, β)    = both co-signatures
//! heal(α?, β?)    = whichever vector the MembershipOracle still vouches for
//! ```
//!
//! Everything here is synchronous and free of IO. Persistence and transport
//! belong to the caller.

mod anchor;
mod derive;
mod error;
mod heal;
mod ledger;
mod oracle;
mod seal;
mod session;

pub use anchor::{
    ANCHOR_LEN, FINGERPRINT_LEN, Fingerprint, MIN_ENTROPY_LEN, PrivateAnchor, PublicVector,
    SealId, VECTOR_LEN, VectorPair, VectorRole,
};
pub use derive::{DerivedIdentity, VectorKeyDeriver, VectorLabels};
pub use error::{CoreError, SigningError};
pub use heal::{HealSource, HealingCoordinator, RecoveredVector};
pub use ledger::{LedgerEntry, LedgerViolation, NodeId, SealLedger};
pub use oracle::{DEFAULT_CAPACITY, DEFAULT_ERROR_RATE, MembershipOracle, OracleSnapshot};
pub use seal::{SEAL_VERSION, SealCodec, SealRecord, VerifyFailure};
pub use session::IdentitySession;

use sha2::{Digest, Sha256};

/// SHA-256 over a domain tag followed by each part, in order.
pub(crate) fn domain_hash(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
