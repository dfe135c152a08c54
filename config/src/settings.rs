//! Validated engine settings.

use std::fmt;
use std::path::PathBuf;

use aura_core::{VECTOR_LEN, VectorLabels};
use aura_integrity::{DEFAULT_SEGMENT_SIZE, EncodingPatterns};
use aura_types::{BitPattern, Threshold};

use crate::{AuraConfig, ConfigError, config_root, expand_env_vars};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// Two independent Ed25519 co-signers, one per healing vector.
    #[default]
    Ed25519DualCosign,
}

impl SignatureAlgorithm {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ed25519-dual-cosign" => Some(Self::Ed25519DualCosign),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519DualCosign => "ed25519-dual-cosign",
        }
    }

    /// Public vector length this algorithm produces.
    #[must_use]
    pub const fn vector_len(self) -> usize {
        match self {
            Self::Ed25519DualCosign => VECTOR_LEN,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub signature_algorithm: SignatureAlgorithm,
    pub vector_byte_length: usize,
    pub labels: VectorLabels,
    pub coherence: Threshold,
    pub corruption: Threshold,
    pub recovery_floor: Threshold,
    pub segment_size: usize,
    pub patterns: EncodingPatterns,
    /// Explicit key store root. `None` means [`config_root`].
    pub store_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            signature_algorithm: SignatureAlgorithm::default(),
            vector_byte_length: VECTOR_LEN,
            labels: VectorLabels::default(),
            coherence: Threshold::COHERENCE,
            corruption: Threshold::CORRUPTION,
            recovery_floor: Threshold::RECOVERY_FLOOR,
            segment_size: DEFAULT_SEGMENT_SIZE,
            patterns: EncodingPatterns::default(),
            store_dir: None,
        }
    }
}

fn threshold(field: &'static str, value: Option<f64>, default: Threshold) -> Result<Threshold, ConfigError> {
    match value {
        Some(raw) => Threshold::new(raw).map_err(|e| ConfigError::invalid(field, e)),
        None => Ok(default),
    }
}

fn pattern(
    field: &'static str,
    value: Option<&str>,
    default: &BitPattern,
) -> Result<BitPattern, ConfigError> {
    match value {
        Some(raw) => BitPattern::parse(raw).map_err(|e| ConfigError::invalid(field, e)),
        None => Ok(default.clone()),
    }
}

impl EngineSettings {
    /// Load `config.toml` and resolve it. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match AuraConfig::load()? {
            Some(config) => config.resolve(),
            None => Ok(Self::default()),
        }
    }

    /// Key store root: the configured directory, else the config root.
    #[must_use]
    pub fn store_root(&self) -> Option<PathBuf> {
        self.store_dir.clone().or_else(config_root)
    }
}

impl AuraConfig {
    pub fn resolve(&self) -> Result<EngineSettings, ConfigError> {
        let defaults = EngineSettings::default();
        let seal = self.seal.as_ref();
        let integrity = self.integrity.as_ref();
        let encoding = self.encoding.as_ref();

        let signature_algorithm = match seal.and_then(|s| s.signature_algorithm.as_deref()) {
            Some(raw) => SignatureAlgorithm::parse(raw).ok_or_else(|| {
                ConfigError::invalid("seal.signature_algorithm", format!("unknown algorithm {raw:?}"))
            })?,
            None => defaults.signature_algorithm,
        };

        let vector_byte_length = seal
            .and_then(|s| s.vector_byte_length)
            .unwrap_or(signature_algorithm.vector_len());
        if vector_byte_length != signature_algorithm.vector_len() {
            return Err(ConfigError::invalid(
                "seal.vector_byte_length",
                format!(
                    "{signature_algorithm} produces {}-byte vectors, got {vector_byte_length}",
                    signature_algorithm.vector_len()
                ),
            ));
        }

        let labels = match seal.and_then(|s| s.labels.as_deref()) {
            Some([alpha, beta]) => VectorLabels::new(alpha.as_str(), beta.as_str())
                .map_err(|e| ConfigError::invalid("seal.labels", e))?,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "seal.labels",
                    format!("expected exactly two labels, got {}", other.len()),
                ));
            }
            None => defaults.labels,
        };

        let segment_size = integrity
            .and_then(|i| i.segment_size)
            .unwrap_or(defaults.segment_size);
        if segment_size == 0 || segment_size > usize::from(u16::MAX) {
            return Err(ConfigError::invalid(
                "integrity.segment_size",
                format!("must be between 1 and {}, got {segment_size}", u16::MAX),
            ));
        }

        let d = &defaults.patterns;
        let patterns = EncodingPatterns {
            data_primary: pattern(
                "encoding.data_primary",
                encoding.and_then(|e| e.data_primary.as_deref()),
                &d.data_primary,
            )?,
            data_secondary: pattern(
                "encoding.data_secondary",
                encoding.and_then(|e| e.data_secondary.as_deref()),
                &d.data_secondary,
            )?,
            algorithm_execution: pattern(
                "encoding.algorithm_execution",
                encoding.and_then(|e| e.algorithm_execution.as_deref()),
                &d.algorithm_execution,
            )?,
            algorithm_context: pattern(
                "encoding.algorithm_context",
                encoding.and_then(|e| e.algorithm_context.as_deref()),
                &d.algorithm_context,
            )?,
        };
        if patterns.data_primary == patterns.data_secondary {
            return Err(ConfigError::invalid(
                "encoding.data_secondary",
                "must differ from data_primary",
            ));
        }

        let store_dir = self
            .store
            .as_ref()
            .and_then(|s| s.dir.as_deref())
            .map(|dir| PathBuf::from(expand_env_vars(dir)));

        Ok(EngineSettings {
            signature_algorithm,
            vector_byte_length,
            labels,
            coherence: threshold(
                "integrity.coherence_threshold",
                integrity.and_then(|i| i.coherence_threshold),
                defaults.coherence,
            )?,
            corruption: threshold(
                "integrity.corruption_threshold",
                integrity.and_then(|i| i.corruption_threshold),
                defaults.corruption,
            )?,
            recovery_floor: threshold(
                "integrity.recovery_floor",
                integrity.and_then(|i| i.recovery_floor),
                defaults.recovery_floor,
            )?,
            segment_size,
            patterns,
            store_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{EngineSettings, SignatureAlgorithm};
    use crate::{AuraConfig, ConfigError};

    fn resolve(toml_str: &str) -> Result<EngineSettings, ConfigError> {
        toml::from_str::<AuraConfig>(toml_str).unwrap().resolve()
    }

    #[test]
    fn empty_config_resolves_to_defaults() {
        assert_eq!(resolve("").unwrap(), EngineSettings::default());
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = EngineSettings::default();
        assert_eq!(s.signature_algorithm, SignatureAlgorithm::Ed25519DualCosign);
        assert_eq!(s.vector_byte_length, 32);
        assert!((s.coherence.value() - 0.954).abs() < f64::EPSILON);
        assert!((s.corruption.value() - 0.7).abs() < f64::EPSILON);
        assert_eq!(s.segment_size, 64);
        assert_eq!(s.patterns.data_primary.to_string(), "0101");
        assert_eq!(s.patterns.algorithm_context.to_string(), "1000");
    }

    #[test]
    fn overrides_apply() {
        let s = resolve(
            r#"
[seal]
labels = ["left", "right"]
[integrity]
coherence_threshold = 0.99
segment_size = 16
[encoding]
data_primary = "0011"
[store]
dir = "/tmp/aura-store"
"#,
        )
        .unwrap();
        assert_eq!(s.labels.alpha, "left");
        assert!((s.coherence.value() - 0.99).abs() < f64::EPSILON);
        assert_eq!(s.segment_size, 16);
        assert_eq!(s.patterns.data_primary.to_string(), "0011");
        assert_eq!(s.store_dir, Some(PathBuf::from("/tmp/aura-store")));
        assert_eq!(s.store_root(), Some(PathBuf::from("/tmp/aura-store")));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = resolve("[integrity]\ncorruption_threshold = 1.5").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "integrity.corruption_threshold",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_algorithm_and_wrong_length() {
        assert!(resolve("[seal]\nsignature_algorithm = \"rsa\"").is_err());
        assert!(resolve("[seal]\nvector_byte_length = 16").is_err());
    }

    #[test]
    fn rejects_bad_labels_and_patterns() {
        assert!(resolve("[seal]\nlabels = [\"only\"]").is_err());
        assert!(resolve("[seal]\nlabels = [\"same\", \"same\"]").is_err());
        assert!(resolve("[encoding]\ndata_primary = \"01x1\"").is_err());
        assert!(resolve("[encoding]\ndata_secondary = \"0101\"").is_err());
        assert!(resolve("[integrity]\nsegment_size = 0").is_err());
    }
}
