//! Configuration for AuraSeal.
//!
//! `~/.aura/config.toml` (or `$AURA_HOME/config.toml`) is deserialized into
//! [`AuraConfig`], where every field is optional, then resolved into
//! validated [`EngineSettings`]. A missing file means defaults.
//!
//! ```toml
//! [seal]
//! vector_byte_length = 32
//! signature_algorithm = "ed25519-dual-cosign"
//! labels = ["alpha", "beta"]
//!
//! [integrity]
//! coherence_threshold = 0.954
//! corruption_threshold = 0.7
//! recovery_floor = 0.95
//! segment_size = 64
//!
//! [encoding]
//! data_primary = "0101"
//! data_secondary = "1110"
//! algorithm_execution = "1110"
//! algorithm_context = "1000"
//!
//! [store]
//! dir = "${HOME}/.aura"
//! ```

mod config;
mod settings;

pub use config::{
    AuraConfig, ConfigError, EncodingConfig, IntegrityConfig, SealConfig, StoreConfig,
    config_path, config_root, expand_env_vars,
};
pub use settings::{EngineSettings, SignatureAlgorithm};
