//! Anchor and healing-vector derivation.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    CoreError, MIN_ENTROPY_LEN, MembershipOracle, PrivateAnchor, PublicVector, VectorPair,
    VectorRole, domain_hash,
};

const ANCHOR_CONTEXT: &[u8] = b"aura-seal:anchor:v1";
const VECTOR_DOMAIN: &[u8] = b"aura-seal:vector:v1";

/// Domain-separation labels for the two co-signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorLabels {
    pub alpha: String,
    pub beta: String,
}

impl Default for VectorLabels {
    fn default() -> Self {
        Self {
            alpha: "alpha".to_string(),
            beta: "beta".to_string(),
        }
    }
}

impl VectorLabels {
    pub fn new(alpha: impl Into<String>, beta: impl Into<String>) -> Result<Self, CoreError> {
        let labels = Self {
            alpha: alpha.into(),
            beta: beta.into(),
        };
        if labels.alpha.trim().is_empty() || labels.beta.trim().is_empty() {
            return Err(CoreError::InvalidLabels("labels must not be empty"));
        }
        if labels.alpha == labels.beta {
            return Err(CoreError::InvalidLabels("labels must be distinct"));
        }
        Ok(labels)
    }

    #[must_use]
    pub fn get(&self, role: VectorRole) -> &str {
        match role {
            VectorRole::Alpha => &self.alpha,
            VectorRole::Beta => &self.beta,
        }
    }
}

/// Output of a derivation: the anchor plus both public vectors.
#[derive(Debug)]
pub struct DerivedIdentity {
    pub anchor: PrivateAnchor,
    pub vectors: VectorPair,
    pub labels: VectorLabels,
}

#[derive(Debug, Clone, Default)]
pub struct VectorKeyDeriver {
    labels: VectorLabels,
}

impl VectorKeyDeriver {
    #[must_use]
    pub fn new(labels: VectorLabels) -> Self {
        Self { labels }
    }

    #[must_use]
    pub fn labels(&self) -> &VectorLabels {
        &self.labels
    }

    /// Derive an identity from caller entropy and register both vector
    /// fingerprints with the oracle.
    ///
    /// Rejects short entropy before touching the oracle.
    pub fn derive(
        &self,
        entropy: &[u8],
        oracle: &mut MembershipOracle,
    ) -> Result<DerivedIdentity, CoreError> {
        if entropy.len() < MIN_ENTROPY_LEN {
            return Err(CoreError::InsufficientEntropy {
                got: entropy.len(),
                min: MIN_ENTROPY_LEN,
            });
        }

        let anchor = PrivateAnchor::new(domain_hash(entropy, &[ANCHOR_CONTEXT]));
        let identity = self.derive_from_anchor(anchor);

        oracle.register(&identity.vectors.alpha);
        oracle.register(&identity.vectors.beta);

        info!(
            seal_id = %identity.vectors.seal_id(),
            alpha = %identity.vectors.alpha.fingerprint(),
            beta = %identity.vectors.beta.fingerprint(),
            "Derived healing vectors"
        );
        Ok(identity)
    }

    /// Re-derive both vectors from an existing anchor. Does not register.
    #[must_use]
    pub fn derive_from_anchor(&self, anchor: PrivateAnchor) -> DerivedIdentity {
        let alpha = co_signing_key(&anchor, &self.labels.alpha);
        let beta = co_signing_key(&anchor, &self.labels.beta);
        let vectors = VectorPair {
            alpha: PublicVector::new(alpha.verifying_key().to_bytes()),
            beta: PublicVector::new(beta.verifying_key().to_bytes()),
        };
        debug!(seal_id = %vectors.seal_id(), "Re-derived vectors from anchor");

        DerivedIdentity {
            anchor,
            vectors,
            labels: self.labels.clone(),
        }
    }
}

/// Independent Ed25519 co-signer for one label.
///
/// `seed = SHA-256(domain || u64be(len(label)) || label || anchor)`. The
/// length prefix keeps `("ab", "c")` and `("a", "bc")` style labels apart.
pub(crate) fn co_signing_key(anchor: &PrivateAnchor, label: &str) -> SigningKey {
    let label_len = (label.len() as u64).to_be_bytes();
    let seed = domain_hash(
        VECTOR_DOMAIN,
        &[&label_len, label.as_bytes(), anchor.expose_secret()],
    );
    SigningKey::from_bytes(&seed)
}
