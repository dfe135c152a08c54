//! End-to-end: fixture birth, seal, verify, persist and restore.

use aura_config::EngineSettings;
use aura_core::{SealRecord, VectorKeyDeriver, VectorLabels};
use aura_engine::{AuraEvent, FileKeyStore, KeyStore, Orchestrator, VerificationOutcome};
use aura_types::IdentityState;
use tempfile::tempdir;

use crate::common::{
    FIXTURE_ALPHA, FIXTURE_ALPHA_FINGERPRINT, FIXTURE_BETA, FIXTURE_BETA_FINGERPRINT,
    FIXTURE_ENTROPY, file_orchestrator, memory_orchestrator,
};

#[test]
fn fixture_entropy_pins_both_vectors() {
    let (orch, sink) = memory_orchestrator();
    let session = orch.birth(&FIXTURE_ENTROPY).unwrap();

    assert_eq!(session.vectors().alpha.to_hex(), FIXTURE_ALPHA);
    assert_eq!(session.vectors().beta.to_hex(), FIXTURE_BETA);

    let info = orch.identity_info(&session);
    assert_eq!(info.fingerprint_alpha.to_string(), FIXTURE_ALPHA_FINGERPRINT);
    assert_eq!(info.fingerprint_beta.to_string(), FIXTURE_BETA_FINGERPRINT);
    assert!(sink.contains(|e| matches!(e, AuraEvent::Birth { .. })));
}

#[test]
fn derivation_is_deterministic_and_bit_sensitive() {
    let deriver = VectorKeyDeriver::default();
    let mut oracle = aura_core::MembershipOracle::default();
    let a = deriver.derive(&FIXTURE_ENTROPY, &mut oracle).unwrap();
    let b = deriver.derive(&FIXTURE_ENTROPY, &mut oracle).unwrap();
    assert_eq!(a.vectors, b.vectors);
    assert_eq!(a.anchor.expose_secret(), b.anchor.expose_secret());

    let mut flipped = FIXTURE_ENTROPY;
    flipped[31] ^= 0x01;
    let c = deriver.derive(&flipped, &mut oracle).unwrap();
    assert_ne!(c.vectors.alpha, a.vectors.alpha);
    assert_ne!(c.vectors.beta, a.vectors.beta);
}

#[test]
fn hello_seals_and_last_byte_flip_fails() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&FIXTURE_ENTROPY).unwrap();
    let record = orch.seal(&mut session, b"hello").unwrap();
    let vectors = *session.vectors();

    assert!(orch.verify_detached(&vectors, b"hello", &record));
    assert!(!orch.verify_detached(&vectors, b"hellp", &record));

    assert_eq!(
        orch.verify(&mut session, &vectors, b"hello", &record).unwrap(),
        VerificationOutcome::Verified
    );
    assert_eq!(session.state(), IdentityState::Verified);
}

#[test]
fn every_single_byte_flip_is_detected() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&[0x17; 48]).unwrap();
    let payload = b"tamper evidence across the whole payload".to_vec();
    let record = orch.seal(&mut session, &payload).unwrap();

    for index in 0..payload.len() {
        let mut tampered = payload.clone();
        tampered[index] ^= 0x80;
        assert!(
            !orch.verify_detached(session.vectors(), &tampered, &record),
            "flip at {index} verified"
        );
    }
}

#[test]
fn record_survives_json_transport() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&FIXTURE_ENTROPY).unwrap();
    let record = orch.seal(&mut session, b"transported").unwrap();

    let json = record.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["fingerprint_alpha"], FIXTURE_ALPHA_FINGERPRINT);
    assert_eq!(value["fingerprint_beta"], FIXTURE_BETA_FINGERPRINT);

    let parsed = SealRecord::from_json(&json).unwrap();
    assert_eq!(parsed, record);
    assert!(orch.verify_detached(session.vectors(), b"transported", &parsed));
}

#[test]
fn identity_persists_across_orchestrators() {
    let dir = tempdir().unwrap();
    let (seal_id, record) = {
        let orch = file_orchestrator(dir.path());
        let mut session = orch.birth(&FIXTURE_ENTROPY).unwrap();
        let record = orch.seal(&mut session, b"persisted").unwrap();
        (session.seal_id(), record)
    };

    let store = FileKeyStore::new(dir.path());
    assert_eq!(store.list_identities().unwrap(), vec![seal_id]);

    let orch = file_orchestrator(dir.path());
    let mut restored = orch.load_or_birth().unwrap();
    assert_eq!(restored.seal_id(), seal_id);
    assert_eq!(restored.vectors().alpha.to_hex(), FIXTURE_ALPHA);

    let vectors = *restored.vectors();
    let outcome = orch
        .verify(&mut restored, &vectors, b"persisted", &record)
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::Verified);
}

#[test]
fn every_seal_lands_in_the_ledger() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&FIXTURE_ENTROPY).unwrap();
    for i in 0..40u32 {
        orch.seal(&mut session, &i.to_be_bytes()).unwrap();
    }

    let entries = orch.ledger_entries();
    assert_eq!(entries.len(), 40);
    assert!(entries.windows(2).all(|w| w[0].digest < w[1].digest));
    orch.ledger_integrity().unwrap();
}

#[test]
fn later_births_are_resumed_across_orchestrators() {
    let dir = tempdir().unwrap();
    let born: Vec<_> = {
        let orch = file_orchestrator(dir.path());
        (0..6u8)
            .map(|seed| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                orch.birth(&[0x60 + seed; 32]).unwrap().seal_id()
            })
            .collect()
    };

    let orch = file_orchestrator(dir.path());
    assert_eq!(orch.load_or_birth().unwrap().seal_id(), born[5]);
    assert_eq!(FileKeyStore::new(dir.path()).list_identities().unwrap().len(), 6);

    // Without the active pointer the newest identity wins.
    std::fs::remove_file(dir.path().join("active")).unwrap();
    assert_eq!(orch.load_or_birth().unwrap().seal_id(), born[5]);
}

#[test]
fn identity_born_under_custom_labels_keeps_sealing() {
    let dir = tempdir().unwrap();
    let custom = EngineSettings {
        labels: VectorLabels::new("left", "right").unwrap(),
        ..EngineSettings::default()
    };
    let seal_id = Orchestrator::new(custom, FileKeyStore::new(dir.path()))
        .unwrap()
        .birth(&FIXTURE_ENTROPY)
        .unwrap()
        .seal_id();

    let orch = file_orchestrator(dir.path());
    let mut session = orch.restore(seal_id).unwrap();
    assert_eq!(session.labels().alpha, "left");
    let record = orch.seal(&mut session, b"payload").unwrap();
    assert!(orch.verify_detached(session.vectors(), b"payload", &record));
}
