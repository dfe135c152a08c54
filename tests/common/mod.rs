//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use aura_config::EngineSettings;
use aura_engine::{FileKeyStore, MemoryKeyStore, Orchestrator, RecordingSink};

/// Entropy for the pinned derivation fixture.
pub const FIXTURE_ENTROPY: [u8; 32] = [0x41; 32];
pub const FIXTURE_ALPHA: &str = "9c1581b1da29b1e4ec331404d58d3c3054463814cb7beedc49d5c0f9b5d192fd";
pub const FIXTURE_BETA: &str = "19585ab6f8e9df0ba23fb1d845dc41072b1d231c6f232157dd47ef3a4ea0dca0";
pub const FIXTURE_ALPHA_FINGERPRINT: &str = "5e5b7b852000c98c";
pub const FIXTURE_BETA_FINGERPRINT: &str = "cdeee30719022a1e";

/// In-memory orchestrator with a recording sink.
pub fn memory_orchestrator() -> (Orchestrator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let orch = Orchestrator::new(EngineSettings::default(), MemoryKeyStore::new())
        .expect("orchestrator")
        .with_events(Arc::clone(&sink));
    (orch, sink)
}

/// Orchestrator persisting to `root`.
pub fn file_orchestrator(root: &Path) -> Orchestrator {
    Orchestrator::new(EngineSettings::default(), FileKeyStore::new(root)).expect("orchestrator")
}

/// The `aura` binary with its home pointed at `home`.
pub fn aura(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_aura"));
    cmd.env("AURA_HOME", home)
        .env("AURA_ALLOW_COREDUMPS", "1")
        .env_remove("RUST_LOG");
    cmd
}
