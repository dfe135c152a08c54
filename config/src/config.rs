use std::{env, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Default, Deserialize)]
pub struct AuraConfig {
    pub seal: Option<SealConfig>,
    pub integrity: Option<IntegrityConfig>,
    pub encoding: Option<EncodingConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Invalid {
            field,
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SealConfig {
    /// Public vector length in bytes. Must match the signature algorithm.
    pub vector_byte_length: Option<usize>,
    /// Only `"ed25519-dual-cosign"` is supported.
    pub signature_algorithm: Option<String>,
    /// Domain-separation labels for the α and β vectors.
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntegrityConfig {
    pub coherence_threshold: Option<f64>,
    pub corruption_threshold: Option<f64>,
    pub recovery_floor: Option<f64>,
    /// Bytes per segment in protected reference frames.
    pub segment_size: Option<usize>,
}

/// Repeating bit patterns, written as strings of `0` and `1`.
#[derive(Debug, Default, Deserialize)]
pub struct EncodingConfig {
    pub data_primary: Option<String>,
    pub data_secondary: Option<String>,
    pub algorithm_execution: Option<String>,
    pub algorithm_context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Key store root. `${VAR}` references are expanded.
    pub dir: Option<String>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            Some(_) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl AuraConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }
}

/// `$AURA_HOME`, else `~/.aura`.
#[must_use]
pub fn config_root() -> Option<PathBuf> {
    match env::var_os("AURA_HOME") {
        Some(root) if !root.is_empty() => Some(PathBuf::from(root)),
        _ => dirs::home_dir().map(|home| home.join(".aura")),
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_root().map(|root| root.join("config.toml"))
}
