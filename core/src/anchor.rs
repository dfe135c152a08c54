//! Anchor, healing vectors, and their fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CoreError, domain_hash};

pub const MIN_ENTROPY_LEN: usize = 32;
pub const ANCHOR_LEN: usize = 32;
pub const VECTOR_LEN: usize = 32;
pub const FINGERPRINT_LEN: usize = 8;

const FINGERPRINT_DOMAIN: &[u8] = b"aura-seal:fingerprint:v1";
const SEAL_ID_DOMAIN: &[u8] = b"aura-seal:id:v1";
const SEAL_ID_LEN: usize = 16;

/// The secret scalar every public artifact is derived from.
///
/// Never serialized, never cloned, zeroized on drop. `Debug` is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateAnchor([u8; ANCHOR_LEN]);

impl PrivateAnchor {
    pub(crate) fn new(bytes: [u8; ANCHOR_LEN]) -> Self {
        Self(bytes)
    }

    /// Rebuild an anchor from owner-only storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let array: [u8; ANCHOR_LEN] = bytes.try_into().map_err(|_| CoreError::InvalidAnchor {
            expected: ANCHOR_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw anchor bytes for owner-only persistence. Do not log or transmit.
    #[must_use]
    pub fn expose_secret(&self) -> &[u8; ANCHOR_LEN] {
        &self.0
    }
}

impl fmt::Debug for PrivateAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateAnchor([REDACTED])")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorRole {
    Alpha,
    Beta,
}

impl VectorRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
        }
    }
}

impl fmt::Display for VectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public healing vector: the Ed25519 verifying key of one co-signer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicVector(#[serde(with = "hex::serde")] [u8; VECTOR_LEN]);

impl PublicVector {
    pub(crate) fn new(bytes: [u8; VECTOR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let array: [u8; VECTOR_LEN] = bytes.try_into().map_err(|_| CoreError::InvalidVector {
            expected: VECTOR_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(raw: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(raw.trim()).map_err(|_| CoreError::InvalidVector {
            expected: VECTOR_LEN,
            got: raw.trim().len() / 2,
        })?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; VECTOR_LEN] {
        &self.0
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let digest = domain_hash(FINGERPRINT_DOMAIN, &[&self.0]);
        let mut fp = [0u8; FINGERPRINT_LEN];
        fp.copy_from_slice(&digest[..FINGERPRINT_LEN]);
        Fingerprint(fp)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicVector({})", self.to_hex())
    }
}

impl fmt::Display for PublicVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Truncated hash of a public vector, embedded in seal records and stored in
/// the MembershipOracle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex::serde")] [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Constant-time comparison.
    #[must_use]
    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// The α/β pair belonging to one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorPair {
    pub alpha: PublicVector,
    pub beta: PublicVector,
}

impl VectorPair {
    #[must_use]
    pub fn get(&self, role: VectorRole) -> &PublicVector {
        match role {
            VectorRole::Alpha => &self.alpha,
            VectorRole::Beta => &self.beta,
        }
    }

    #[must_use]
    pub fn seal_id(&self) -> SealId {
        let digest = domain_hash(SEAL_ID_DOMAIN, &[&self.alpha.0, &self.beta.0]);
        let mut id = [0u8; SEAL_ID_LEN];
        id.copy_from_slice(&digest[..SEAL_ID_LEN]);
        SealId(id)
    }
}

/// Stable identity insignia derived from both vectors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealId(#[serde(with = "hex::serde")] [u8; SEAL_ID_LEN]);

impl SealId {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = hex::decode(raw.trim()).ok()?;
        let array: [u8; SEAL_ID_LEN] = bytes.as_slice().try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Debug for SealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealId({})", hex::encode(self.0))
    }
}

impl fmt::Display for SealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
