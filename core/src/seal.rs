//! Seal records and the codec that issues and checks them.
//!
//! A seal carries two Ed25519 co-signatures, one per healing vector, over the
//! same framed message. Full verification needs both; after healing, the
//! surviving vector checks its own half with [`SealCodec::verify_with_vector`].

use chrono::{DateTime, Utc};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::derive::co_signing_key;
use crate::{
    CoreError, Fingerprint, PrivateAnchor, PublicVector, SigningError, VectorLabels, VectorPair,
    VectorRole,
};

pub const SEAL_VERSION: u32 = 1;

const SEAL_DOMAIN: &[u8] = b"aura-seal:seal:v1";
const DIGEST_LEN: usize = 32;

/// Why a record failed to verify. `verify` folds all of these into `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("unsupported seal version {0}")]
    UnsupportedVersion(u32),
    #[error("signature must be {expected} bytes, got {got}")]
    SignatureLength { expected: usize, got: usize },
    #[error("{0} fingerprint does not match the record")]
    FingerprintMismatch(VectorRole),
    #[error("payload digest does not match the record")]
    DigestMismatch,
    #[error("{0} vector is not a valid verifying key")]
    MalformedVector(VectorRole),
    #[error("{0} co-signature is invalid")]
    BadSignature(VectorRole),
}

/// Immutable output of [`SealCodec::seal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealRecord {
    version: u32,
    #[serde(with = "hex::serde")]
    digest: [u8; DIGEST_LEN],
    #[serde(with = "hex::serde")]
    signature: Vec<u8>,
    fingerprint_alpha: Fingerprint,
    fingerprint_beta: Fingerprint,
    timestamp: DateTime<Utc>,
}

impl SealRecord {
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// α co-signature followed by β co-signature.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    #[must_use]
    pub fn fingerprint(&self, role: VectorRole) -> &Fingerprint {
        match role {
            VectorRole::Alpha => &self.fingerprint_alpha,
            VectorRole::Beta => &self.fingerprint_beta,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }

    fn co_signature(&self, role: VectorRole) -> Option<Signature> {
        let half = match role {
            VectorRole::Alpha => self.signature.get(..SIGNATURE_LENGTH)?,
            VectorRole::Beta => self.signature.get(SIGNATURE_LENGTH..2 * SIGNATURE_LENGTH)?,
        };
        Signature::from_slice(half).ok()
    }
}

fn payload_digest(payload: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(payload).into()
}

fn signed_message(version: u32, digest: &[u8; DIGEST_LEN], timestamp: DateTime<Utc>) -> Vec<u8> {
    let mut message = Vec::with_capacity(SEAL_DOMAIN.len() + 4 + DIGEST_LEN + 8);
    message.extend_from_slice(SEAL_DOMAIN);
    message.extend_from_slice(&version.to_be_bytes());
    message.extend_from_slice(digest);
    message.extend_from_slice(&timestamp.timestamp_millis().to_be_bytes());
    message
}

#[derive(Debug, Clone, Default)]
pub struct SealCodec {
    labels: VectorLabels,
}

impl SealCodec {
    #[must_use]
    pub fn new(labels: VectorLabels) -> Self {
        Self { labels }
    }

    pub fn seal(
        &self,
        anchor: &PrivateAnchor,
        vectors: &VectorPair,
        payload: &[u8],
    ) -> Result<SealRecord, SigningError> {
        self.seal_at(anchor, vectors, payload, Utc::now())
    }

    /// Seal with an explicit timestamp. Sub-millisecond precision is dropped so
    /// the record round-trips through its serialized form.
    pub fn seal_at(
        &self,
        anchor: &PrivateAnchor,
        vectors: &VectorPair,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<SealRecord, SigningError> {
        let alpha = co_signing_key(anchor, &self.labels.alpha);
        let beta = co_signing_key(anchor, &self.labels.beta);
        if alpha.verifying_key().as_bytes() != vectors.alpha.as_bytes() {
            return Err(SigningError::AnchorMismatch(VectorRole::Alpha));
        }
        if beta.verifying_key().as_bytes() != vectors.beta.as_bytes() {
            return Err(SigningError::AnchorMismatch(VectorRole::Beta));
        }

        let timestamp =
            DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp);
        let digest = payload_digest(payload);
        let message = signed_message(SEAL_VERSION, &digest, timestamp);

        let mut signature = Vec::with_capacity(2 * SIGNATURE_LENGTH);
        signature.extend_from_slice(&alpha.sign(&message).to_bytes());
        signature.extend_from_slice(&beta.sign(&message).to_bytes());

        Ok(SealRecord {
            version: SEAL_VERSION,
            digest,
            signature,
            fingerprint_alpha: vectors.alpha.fingerprint(),
            fingerprint_beta: vectors.beta.fingerprint(),
            timestamp,
        })
    }

    /// True iff both co-signatures verify under the presented vectors.
    ///
    /// Total: malformed records and keys are a `false`, never an error.
    #[must_use]
    pub fn verify(&self, vectors: &VectorPair, payload: &[u8], record: &SealRecord) -> bool {
        match self.verify_detailed(vectors, payload, record) {
            Ok(()) => true,
            Err(reason) => {
                debug!(%reason, digest = %record.digest_hex(), "Seal verification failed");
                false
            }
        }
    }

    pub fn verify_detailed(
        &self,
        vectors: &VectorPair,
        payload: &[u8],
        record: &SealRecord,
    ) -> Result<(), VerifyFailure> {
        check_shape(record)?;
        for role in [VectorRole::Alpha, VectorRole::Beta] {
            check_fingerprint(vectors.get(role), role, record)?;
        }
        check_digest(payload, record)?;
        let message = signed_message(record.version, &record.digest, record.timestamp);
        for role in [VectorRole::Alpha, VectorRole::Beta] {
            check_co_signature(vectors.get(role), role, &message, record)?;
        }
        Ok(())
    }

    /// Check one co-signature under a single surviving vector.
    #[must_use]
    pub fn verify_with_vector(
        &self,
        vector: &PublicVector,
        role: VectorRole,
        payload: &[u8],
        record: &SealRecord,
    ) -> bool {
        let result = check_shape(record)
            .and_then(|()| check_fingerprint(vector, role, record))
            .and_then(|()| check_digest(payload, record))
            .and_then(|()| {
                let message = signed_message(record.version, &record.digest, record.timestamp);
                check_co_signature(vector, role, &message, record)
            });
        if let Err(reason) = result {
            debug!(%reason, %role, "Single-vector verification failed");
            return false;
        }
        true
    }
}

fn check_shape(record: &SealRecord) -> Result<(), VerifyFailure> {
    if record.version != SEAL_VERSION {
        return Err(VerifyFailure::UnsupportedVersion(record.version));
    }
    if record.signature.len() != 2 * SIGNATURE_LENGTH {
        return Err(VerifyFailure::SignatureLength {
            expected: 2 * SIGNATURE_LENGTH,
            got: record.signature.len(),
        });
    }
    Ok(())
}

fn check_fingerprint(
    vector: &PublicVector,
    role: VectorRole,
    record: &SealRecord,
) -> Result<(), VerifyFailure> {
    if vector.fingerprint().matches(record.fingerprint(role)) {
        Ok(())
    } else {
        Err(VerifyFailure::FingerprintMismatch(role))
    }
}

fn check_digest(payload: &[u8], record: &SealRecord) -> Result<(), VerifyFailure> {
    if payload_digest(payload) == record.digest {
        Ok(())
    } else {
        Err(VerifyFailure::DigestMismatch)
    }
}

fn check_co_signature(
    vector: &PublicVector,
    role: VectorRole,
    message: &[u8],
    record: &SealRecord,
) -> Result<(), VerifyFailure> {
    let key = VerifyingKey::from_bytes(vector.as_bytes())
        .map_err(|_| VerifyFailure::MalformedVector(role))?;
    let signature = record
        .co_signature(role)
        .ok_or(VerifyFailure::BadSignature(role))?;
    key.verify_strict(message, &signature)
        .map_err(|_| VerifyFailure::BadSignature(role))
}
