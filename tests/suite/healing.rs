//! Healing vectors: single-vector recovery and breach.

use aura_core::{CoreError, HealSource, PublicVector, VectorPair, VectorRole};
use aura_engine::{AuraEvent, EngineError, VerificationOutcome};
use aura_types::IdentityState;

use crate::common::memory_orchestrator;

fn corrupted(vector: &PublicVector) -> PublicVector {
    let mut bytes = *vector.as_bytes();
    bytes[0] ^= 0x01;
    bytes[17] ^= 0x40;
    PublicVector::from_bytes(&bytes).unwrap()
}

#[test]
fn heal_prefers_valid_known_good() {
    let (orch, _) = memory_orchestrator();
    let session = orch.birth(&[9; 32]).unwrap();
    let alpha = session.vectors().alpha;

    let recovered = orch.heal(&alpha, &corrupted(&alpha)).unwrap();
    assert_eq!(recovered.vector, alpha);
    assert_eq!(recovered.source, HealSource::KnownGood);
    assert!((recovered.confidence - 1.0).abs() < f64::EPSILON);
}

#[test]
fn heal_falls_back_to_candidate() {
    let (orch, _) = memory_orchestrator();
    let session = orch.birth(&[10; 32]).unwrap();
    let beta = session.vectors().beta;

    let recovered = orch.heal(&corrupted(&beta), &beta).unwrap();
    assert_eq!(recovered.vector, beta);
    assert_eq!(recovered.source, HealSource::Candidate);
    assert!(recovered.confidence < 1.0);
    assert!(recovered.confidence > 0.99);
}

#[test]
fn heal_with_two_corrupted_vectors_is_terminal() {
    let (orch, _) = memory_orchestrator();
    let session = orch.birth(&[11; 32]).unwrap();
    let v = session.vectors();

    let err = orch
        .heal(&corrupted(&v.alpha), &corrupted(&v.beta))
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::DualVectorCorruption)));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn either_surviving_vector_verifies_alone() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&[12; 32]).unwrap();
    let record = orch.seal(&mut session, b"independent").unwrap();
    let v = *session.vectors();

    assert!(orch.verify_single(&v.alpha, VectorRole::Alpha, b"independent", &record));
    assert!(orch.verify_single(&v.beta, VectorRole::Beta, b"independent", &record));
    assert!(!orch.verify_single(&v.beta, VectorRole::Alpha, b"independent", &record));
    assert!(!orch.verify_single(&v.alpha, VectorRole::Alpha, b"independenT", &record));
}

#[test]
fn lost_alpha_heals_to_verified() {
    let (orch, sink) = memory_orchestrator();
    let mut session = orch.birth(&[13; 32]).unwrap();
    let record = orch.seal(&mut session, b"payload").unwrap();
    let presented = VectorPair {
        alpha: corrupted(&session.vectors().alpha),
        beta: session.vectors().beta,
    };

    let outcome = orch
        .verify(&mut session, &presented, b"payload", &record)
        .unwrap();
    assert!(matches!(
        outcome,
        VerificationOutcome::Healed {
            role: VectorRole::Beta,
            ..
        }
    ));
    assert!(outcome.is_valid());
    assert_eq!(session.state(), IdentityState::Verified);

    let transitions: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AuraEvent::StateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        [
            IdentityState::Sealed,
            IdentityState::Healing,
            IdentityState::Verified
        ]
    );
}

#[test]
fn healed_vector_still_rejects_tampered_payload() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&[14; 32]).unwrap();
    let record = orch.seal(&mut session, b"payload").unwrap();
    let presented = VectorPair {
        alpha: session.vectors().alpha,
        beta: corrupted(&session.vectors().beta),
    };

    let outcome = orch
        .verify(&mut session, &presented, b"payloaD", &record)
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::Rejected);
    assert_eq!(session.state(), IdentityState::Sealed);
}

#[test]
fn breach_blocks_all_further_work() {
    let (orch, sink) = memory_orchestrator();
    let mut session = orch.birth(&[15; 32]).unwrap();
    let record = orch.seal(&mut session, b"payload").unwrap();
    let v = *session.vectors();
    let presented = VectorPair {
        alpha: corrupted(&v.alpha),
        beta: corrupted(&v.beta),
    };

    let err = orch
        .verify(&mut session, &presented, b"payload", &record)
        .unwrap_err();
    assert!(err.is_breach());
    assert_eq!(session.state(), IdentityState::Breached);
    assert!(sink.contains(|e| matches!(e, AuraEvent::Breached { .. })));

    assert!(matches!(
        orch.verify(&mut session, &v, b"payload", &record),
        Err(EngineError::Core(CoreError::Breached { .. }))
    ));
    assert!(orch.seal(&mut session, b"again").is_err());

    let reborn = orch.birth(&[16; 32]).unwrap();
    assert_eq!(reborn.state(), IdentityState::Birth);
}
