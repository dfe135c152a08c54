//! Protected references: detection routing, repair, recovery floor.

use aura_engine::{EngineError, Orchestrator};
use aura_integrity::{
    CorruptionIndicators, CorruptionRecoverySystem, IntegrityError, PatternRecognizer,
};
use aura_types::Threshold;

use crate::common::memory_orchestrator;

const HEADER_LEN: usize = 51;
const SEGMENT: usize = 64;
const CHECKSUM: usize = 8;

fn payload() -> Vec<u8> {
    (0..=255u8).cycle().take(500).collect()
}

/// Reports a fixed probability regardless of input.
struct FixtureRecognizer(f64);

impl PatternRecognizer for FixtureRecognizer {
    fn analyze(&self, _reference: &[u8]) -> CorruptionIndicators {
        CorruptionIndicators {
            corruption_probability: self.0,
            framed: true,
            header_intact: true,
            damaged_segments: Vec::new(),
        }
    }
}

fn with_fixture(orch: Orchestrator, probability: f64) -> Orchestrator {
    orch.with_recovery(
        CorruptionRecoverySystem::new(Threshold::CORRUPTION, SEGMENT)
            .with_recognizer(FixtureRecognizer(probability)),
    )
}

fn segment_start(index: usize) -> usize {
    HEADER_LEN + index * (SEGMENT + CHECKSUM)
}

#[test]
fn probability_above_threshold_routes_to_reconstruction() {
    let (orch, _) = memory_orchestrator();
    let orch = with_fixture(orch, 0.71);
    let framed = orch.protect_reference(&payload()).unwrap();

    let recovered = orch.recover_reference(&framed).unwrap();
    assert!(recovered.reconstructed);
    assert!(recovered.analysis.corruption_detected);
    assert_eq!(recovered.payload, payload());
    assert!(recovered.authenticity.is_authentic);
}

#[test]
fn probability_at_threshold_stays_clean() {
    let (orch, _) = memory_orchestrator();
    let orch = with_fixture(orch, 0.7);
    let framed = orch.protect_reference(&payload()).unwrap();

    let recovered = orch.recover_reference(&framed).unwrap();
    assert!(!recovered.reconstructed);
    assert!(!recovered.analysis.corruption_detected);
    assert!((recovered.analysis.integrity_score - 0.3).abs() < 1e-9);
}

#[test]
fn single_damaged_segment_is_rebuilt_from_parity() {
    let (orch, _) = memory_orchestrator();
    let mut framed = orch.protect_reference(&payload()).unwrap();
    for offset in 0..10 {
        framed[segment_start(3) + offset] = 0;
    }

    let recovered = orch.recover_reference(&framed).unwrap();
    assert!(recovered.reconstructed);
    assert_eq!(recovered.repaired_segments, vec![3]);
    assert!((recovered.recovery_confidence - 1.0).abs() < f64::EPSILON);
    assert_eq!(recovered.payload, payload());
}

#[test]
fn two_damaged_segments_fall_below_the_floor() {
    let (orch, sink) = memory_orchestrator();
    let mut framed = orch.protect_reference(&payload()).unwrap();
    framed[segment_start(0)] ^= 0xff;
    framed[segment_start(5) + 1] ^= 0xff;

    let err = orch.recover_reference(&framed).unwrap_err();
    let EngineError::CorruptionRecoveryFailure {
        partial,
        confidence,
        floor,
    } = err
    else {
        panic!("expected recovery failure, got {err:?}");
    };
    assert_eq!(partial.len(), payload().len());
    assert!(confidence < floor.value());
    assert!(sink.contains(|e| matches!(e, aura_engine::AuraEvent::RecoveryFailed { .. })));
}

#[test]
fn damaged_header_caps_confidence() {
    let (orch, _) = memory_orchestrator();
    let mut framed = orch.protect_reference(&payload()).unwrap();
    // Inside the recorded payload digest.
    framed[20] ^= 0x01;

    let err = orch.recover_reference(&framed).unwrap_err();
    assert!(matches!(
        err,
        EngineError::CorruptionRecoveryFailure { confidence, .. } if confidence <= 0.5
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn unframed_reference_is_an_input_error() {
    let (orch, _) = memory_orchestrator();
    let err = orch
        .recover_reference(b"corrupted_program_reference_data")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Integrity(IntegrityError::Unframed)
    ));
    assert_eq!(err.exit_code(), 1);
}
