//! Key storage capability.
//!
//! The orchestrator never reaches for a global key directory. It is handed a
//! [`KeyStore`] and persists through it. Layout of [`FileKeyStore`]:
//!
//! ```text
//! <root>/
//!   oracle.json                      membership snapshot
//!   active                           seal id of the identity to resume
//!   identities/<seal_id>/
//!     private.key                    anchor bytes, 0600
//!     public.vectors.json            vectors + labels, 0644
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aura_config::SignatureAlgorithm;
use aura_core::{
    DerivedIdentity, OracleSnapshot, PrivateAnchor, PublicVector, SealId, VectorKeyDeriver,
    VectorLabels, VectorPair,
};
use aura_utils::{
    AtomicWriteOptions, PersistMode, atomic_write_with_options, ensure_owner_only_dir,
    is_owner_only_file,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

const IDENTITIES_DIR: &str = "identities";
const PRIVATE_KEY_FILE: &str = "private.key";
const PUBLIC_VECTORS_FILE: &str = "public.vectors.json";
const ORACLE_FILE: &str = "oracle.json";
const ACTIVE_FILE: &str = "active";

/// How the public vectors relate to the anchor.
pub const KEY_MAPPING: &str =
    "anchor -> sha256(vector:v1 || len(label) || label || anchor) -> ed25519 co-signer per label";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key store IO failed at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("identity {0} not found in key store")]
    NotFound(SealId),
    #[error("corrupt key store entry at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("stored public vectors for {seal_id} were not derived from its anchor")]
    Mismatch { seal_id: SealId },
    #[error("private key at {} is readable by other users or not owned by us", path.display())]
    Insecure { path: PathBuf },
    #[error("key store lock poisoned")]
    Poisoned,
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub trait KeyStore: Send + Sync {
    /// Persist an identity. On failure nothing of it is left listable.
    fn save_identity(
        &self,
        identity: &DerivedIdentity,
        algorithm: SignatureAlgorithm,
    ) -> Result<(), StoreError>;

    /// Load an identity and re-derive its vectors from the anchor. A public
    /// record that the anchor does not reproduce is a [`StoreError::Mismatch`].
    fn load_identity(&self, seal_id: SealId) -> Result<DerivedIdentity, StoreError>;

    /// Complete identities, oldest first.
    fn list_identities(&self) -> Result<Vec<SealId>, StoreError>;

    /// Mark the identity that later sessions resume.
    fn set_active(&self, seal_id: SealId) -> Result<(), StoreError>;

    fn active_identity(&self) -> Result<Option<SealId>, StoreError>;

    fn save_oracle(&self, snapshot: &OracleSnapshot) -> Result<(), StoreError>;

    fn load_oracle(&self) -> Result<Option<OracleSnapshot>, StoreError>;

    /// Where an identity lives, for display.
    fn location(&self, _seal_id: SealId) -> Option<PathBuf> {
        None
    }
}

impl<T: KeyStore + ?Sized> KeyStore for std::sync::Arc<T> {
    fn save_identity(
        &self,
        identity: &DerivedIdentity,
        algorithm: SignatureAlgorithm,
    ) -> Result<(), StoreError> {
        (**self).save_identity(identity, algorithm)
    }

    fn load_identity(&self, seal_id: SealId) -> Result<DerivedIdentity, StoreError> {
        (**self).load_identity(seal_id)
    }

    fn list_identities(&self) -> Result<Vec<SealId>, StoreError> {
        (**self).list_identities()
    }

    fn set_active(&self, seal_id: SealId) -> Result<(), StoreError> {
        (**self).set_active(seal_id)
    }

    fn active_identity(&self) -> Result<Option<SealId>, StoreError> {
        (**self).active_identity()
    }

    fn save_oracle(&self, snapshot: &OracleSnapshot) -> Result<(), StoreError> {
        (**self).save_oracle(snapshot)
    }

    fn load_oracle(&self) -> Result<Option<OracleSnapshot>, StoreError> {
        (**self).load_oracle()
    }

    fn location(&self, seal_id: SealId) -> Option<PathBuf> {
        (**self).location(seal_id)
    }
}

/// Contents of `public.vectors.json`. Safe to share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicVectorsFile {
    pub seal_id: SealId,
    pub alpha: PublicVector,
    pub beta: PublicVector,
    pub labels: VectorLabels,
    pub created: DateTime<Utc>,
    pub signature_algorithm: String,
    pub key_mapping: String,
}

impl PublicVectorsFile {
    #[must_use]
    pub fn describe(identity: &DerivedIdentity, algorithm: SignatureAlgorithm) -> Self {
        Self {
            seal_id: identity.vectors.seal_id(),
            alpha: identity.vectors.alpha,
            beta: identity.vectors.beta,
            labels: identity.labels.clone(),
            created: Utc::now(),
            signature_algorithm: algorithm.as_str().to_string(),
            key_mapping: KEY_MAPPING.to_string(),
        }
    }

    #[must_use]
    pub fn vectors(&self) -> VectorPair {
        VectorPair {
            alpha: self.alpha,
            beta: self.beta,
        }
    }
}

fn rederive(
    anchor: PrivateAnchor,
    labels: VectorLabels,
    expected: &VectorPair,
    seal_id: SealId,
) -> Result<DerivedIdentity, StoreError> {
    let identity = VectorKeyDeriver::new(labels).derive_from_anchor(anchor);
    if identity.vectors != *expected || identity.vectors.seal_id() != seal_id {
        tracing::warn!(%seal_id, "Stored vectors do not match the anchor");
        return Err(StoreError::Mismatch { seal_id });
    }
    Ok(identity)
}

#[derive(Debug, Clone)]
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identities_dir(&self) -> PathBuf {
        self.root.join(IDENTITIES_DIR)
    }

    fn identity_dir(&self, seal_id: SealId) -> PathBuf {
        self.identities_dir().join(seal_id.to_string())
    }

    fn oracle_path(&self) -> PathBuf {
        self.root.join(ORACLE_FILE)
    }

    fn active_path(&self) -> PathBuf {
        self.root.join(ACTIVE_FILE)
    }

    fn read_public(&self, seal_id: SealId) -> Result<PublicVectorsFile, StoreError> {
        let path = self.identity_dir(seal_id).join(PUBLIC_VECTORS_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(seal_id));
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        let public: PublicVectorsFile =
            serde_json::from_str(&raw).map_err(|e| StoreError::corrupt(&path, e))?;
        if public.seal_id != seal_id {
            return Err(StoreError::corrupt(&path, "seal id does not match directory"));
        }
        if SignatureAlgorithm::parse(&public.signature_algorithm).is_none() {
            return Err(StoreError::corrupt(
                &path,
                format!("unknown signature algorithm {:?}", public.signature_algorithm),
            ));
        }
        Ok(public)
    }

    fn read_anchor(&self, seal_id: SealId) -> Result<PrivateAnchor, StoreError> {
        let path = self.identity_dir(seal_id).join(PRIVATE_KEY_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(seal_id));
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        if !is_owner_only_file(&path).map_err(|e| StoreError::io(&path, e))? {
            tracing::warn!(path = %path.display(), "Refusing to load insecure private key");
            return Err(StoreError::Insecure { path });
        }
        PrivateAnchor::from_bytes(&bytes).map_err(|e| StoreError::corrupt(&path, e))
    }
}

impl KeyStore for FileKeyStore {
    fn save_identity(
        &self,
        identity: &DerivedIdentity,
        algorithm: SignatureAlgorithm,
    ) -> Result<(), StoreError> {
        let dir = self.identity_dir(identity.vectors.seal_id());
        ensure_owner_only_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        ensure_owner_only_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;

        // Public half first: an identity only lists once private.key exists.
        let public = dir.join(PUBLIC_VECTORS_FILE);
        let json = serde_json::to_string_pretty(&PublicVectorsFile::describe(identity, algorithm))
            .map_err(|e| StoreError::corrupt(&public, e))?;
        atomic_write_with_options(
            &public,
            json.as_bytes(),
            AtomicWriteOptions::with_mode(PersistMode::PublicRead),
        )
        .map_err(|e| StoreError::io(&public, e))?;

        let private = dir.join(PRIVATE_KEY_FILE);
        if let Err(err) = atomic_write_with_options(
            &private,
            identity.anchor.expose_secret(),
            AtomicWriteOptions::with_mode(PersistMode::OwnerOnly),
        ) {
            if let Err(cleanup) = fs::remove_file(&public) {
                tracing::warn!(path = %public.display(), "Failed to remove partial identity: {cleanup}");
            }
            return Err(StoreError::io(&private, err));
        }

        tracing::info!(
            seal_id = %identity.vectors.seal_id(),
            dir = %dir.display(),
            %algorithm,
            "Identity saved"
        );
        Ok(())
    }

    fn load_identity(&self, seal_id: SealId) -> Result<DerivedIdentity, StoreError> {
        let public = self.read_public(seal_id)?;
        let anchor = self.read_anchor(seal_id)?;
        let expected = public.vectors();
        rederive(anchor, public.labels, &expected, seal_id)
    }

    fn list_identities(&self) -> Result<Vec<SealId>, StoreError> {
        let dir = self.identities_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&dir, err)),
        };

        let mut found: Vec<(DateTime<Utc>, SealId)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(seal_id) = name.to_str().and_then(SealId::parse) else {
                tracing::debug!(entry = ?name, "Skipping non-identity entry");
                continue;
            };
            if !entry.path().join(PRIVATE_KEY_FILE).is_file() {
                tracing::debug!(%seal_id, "Skipping identity without private key");
                continue;
            }
            match self.read_public(seal_id) {
                Ok(public) => found.push((public.created, seal_id)),
                Err(err) => tracing::warn!(%seal_id, "Skipping incomplete identity: {err}"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.to_string().cmp(&b.1.to_string())));
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    fn set_active(&self, seal_id: SealId) -> Result<(), StoreError> {
        ensure_owner_only_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let path = self.active_path();
        atomic_write_with_options(
            &path,
            format!("{seal_id}\n").as_bytes(),
            AtomicWriteOptions::with_mode(PersistMode::OwnerOnly),
        )
        .map_err(|e| StoreError::io(&path, e))
    }

    fn active_identity(&self) -> Result<Option<SealId>, StoreError> {
        let path = self.active_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        SealId::parse(raw.trim())
            .map(Some)
            .ok_or_else(|| StoreError::corrupt(&path, "not a seal id"))
    }

    fn save_oracle(&self, snapshot: &OracleSnapshot) -> Result<(), StoreError> {
        ensure_owner_only_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let path = self.oracle_path();
        let json =
            serde_json::to_string(snapshot).map_err(|e| StoreError::corrupt(&path, e))?;
        atomic_write_with_options(
            &path,
            json.as_bytes(),
            AtomicWriteOptions::with_mode(PersistMode::OwnerOnly),
        )
        .map_err(|e| StoreError::io(&path, e))
    }

    fn load_oracle(&self) -> Result<Option<OracleSnapshot>, StoreError> {
        let path = self.oracle_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::corrupt(&path, e))
    }

    fn location(&self, seal_id: SealId) -> Option<PathBuf> {
        Some(self.identity_dir(seal_id))
    }
}

struct StoredIdentity {
    anchor: Zeroizing<Vec<u8>>,
    vectors: VectorPair,
    labels: VectorLabels,
    sequence: u64,
}

/// In-process store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyStore {
    identities: Mutex<HashMap<SealId, StoredIdentity>>,
    oracle: Mutex<Option<OracleSnapshot>>,
    active: Mutex<Option<SealId>>,
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.identities.lock().map(|ids| ids.len()).unwrap_or(0);
        f.debug_struct("MemoryKeyStore")
            .field("identities", &count)
            .finish_non_exhaustive()
    }
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn save_identity(
        &self,
        identity: &DerivedIdentity,
        _algorithm: SignatureAlgorithm,
    ) -> Result<(), StoreError> {
        let mut ids = self.identities.lock().map_err(|_| StoreError::Poisoned)?;
        let sequence = ids.values().map(|s| s.sequence + 1).max().unwrap_or(0);
        ids.insert(
            identity.vectors.seal_id(),
            StoredIdentity {
                anchor: Zeroizing::new(identity.anchor.expose_secret().to_vec()),
                vectors: identity.vectors,
                labels: identity.labels.clone(),
                sequence,
            },
        );
        Ok(())
    }

    fn load_identity(&self, seal_id: SealId) -> Result<DerivedIdentity, StoreError> {
        let ids = self.identities.lock().map_err(|_| StoreError::Poisoned)?;
        let stored = ids.get(&seal_id).ok_or(StoreError::NotFound(seal_id))?;
        let anchor = PrivateAnchor::from_bytes(&stored.anchor)
            .map_err(|e| StoreError::corrupt(Path::new("<memory>"), e))?;
        rederive(anchor, stored.labels.clone(), &stored.vectors, seal_id)
    }

    fn list_identities(&self) -> Result<Vec<SealId>, StoreError> {
        let ids = self.identities.lock().map_err(|_| StoreError::Poisoned)?;
        let mut out: Vec<(u64, SealId)> = ids.iter().map(|(id, s)| (s.sequence, *id)).collect();
        out.sort_by_key(|(sequence, _)| *sequence);
        Ok(out.into_iter().map(|(_, id)| id).collect())
    }

    fn set_active(&self, seal_id: SealId) -> Result<(), StoreError> {
        let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
        *active = Some(seal_id);
        Ok(())
    }

    fn active_identity(&self) -> Result<Option<SealId>, StoreError> {
        let active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(*active)
    }

    fn save_oracle(&self, snapshot: &OracleSnapshot) -> Result<(), StoreError> {
        let mut oracle = self.oracle.lock().map_err(|_| StoreError::Poisoned)?;
        *oracle = Some(snapshot.clone());
        Ok(())
    }

    fn load_oracle(&self) -> Result<Option<OracleSnapshot>, StoreError> {
        let oracle = self.oracle.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(oracle.clone())
    }
}
