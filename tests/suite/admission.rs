//! Context-bound admission of data/process pairs.

use aura_engine::{AuraEvent, EngineError};
use aura_integrity::ProcessDescriptor;

use crate::common::memory_orchestrator;

const DATA: &[u8] = b"matrix of sensor readings, batch 7";

#[test]
fn bound_pair_reaches_context_bound_execution() {
    let (orch, sink) = memory_orchestrator();
    let descriptor = ProcessDescriptor::bound_to("aggregate(readings)", DATA);

    let data = orch.encode_data(DATA);
    let algorithm = orch.encode_algorithm(&descriptor).unwrap();
    assert!((data.recovery_capability - 0.25).abs() < f64::EPSILON);

    let context = orch.admit(&data, &algorithm).unwrap();
    assert!(context.context_bound_execution_ready);
    assert!(context.coordinate.context_binding);
    assert!(context.coordinate.alignment);
    assert!((context.coordinate.fault_tolerance - 0.9).abs() < f64::EPSILON);
    assert_eq!(context.coordinate.x, context.coordinate.y);
    assert!((context.algorithm_authenticity - 1.0).abs() < f64::EPSILON);
    assert_eq!(context.descriptor.logic(), b"aggregate(readings)");
    assert!(sink.contains(|e| matches!(e, AuraEvent::Admitted { context_bound: true, .. })));
}

#[test]
fn encodings_are_idempotent() {
    let (orch, _) = memory_orchestrator();
    assert_eq!(orch.encode_data(DATA), orch.encode_data(DATA));

    let descriptor = ProcessDescriptor::bound_to("logic", DATA);
    assert_eq!(
        orch.encode_algorithm(&descriptor).unwrap(),
        orch.encode_algorithm(&descriptor).unwrap()
    );
}

#[test]
fn descriptor_for_other_data_is_rejected() {
    let (orch, _) = memory_orchestrator();
    let descriptor = ProcessDescriptor::bound_to("logic", b"different data");

    let err = orch
        .admit(&orch.encode_data(DATA), &orch.encode_algorithm(&descriptor).unwrap())
        .unwrap_err();
    assert!(matches!(err, EngineError::AuthenticityValidation { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn damaged_secondary_copy_is_recovered_before_admission() {
    let (orch, _) = memory_orchestrator();
    let descriptor = ProcessDescriptor::bound_to("logic", DATA);
    let mut algorithm = orch.encode_algorithm(&descriptor).unwrap();
    for index in [0, 9, 40] {
        algorithm.pair.secondary_mut().bits_mut().flip(index).unwrap();
    }

    let context = orch.admit(&orch.encode_data(DATA), &algorithm).unwrap();
    assert!(context.recovered);
    assert_eq!(context.descriptor, descriptor);
}

#[test]
fn both_copies_wrecked_fails_recovery_with_partial_result() {
    let (orch, sink) = memory_orchestrator();
    let descriptor = ProcessDescriptor::bound_to("logic", DATA);
    let mut data = orch.encode_data(DATA);
    let bits = data.pair.primary().bits().len();
    for index in (0..bits).step_by(3) {
        data.pair.primary_mut().bits_mut().flip(index).unwrap();
    }
    for index in (1..bits).step_by(5) {
        data.pair.secondary_mut().bits_mut().flip(index).unwrap();
    }

    let err = orch
        .admit(&data, &orch.encode_algorithm(&descriptor).unwrap())
        .unwrap_err();
    let EngineError::CorruptionRecoveryFailure {
        partial,
        confidence,
        floor,
    } = err
    else {
        panic!("expected recovery failure");
    };
    assert_eq!(partial.len(), DATA.len());
    assert!(confidence < floor.value());
    assert!(sink.contains(|e| matches!(e, AuraEvent::RecoveryFailed { .. })));
}
