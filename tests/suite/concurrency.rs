//! Read-only operations shared across threads.

use std::thread;

use aura_core::PublicVector;

use crate::common::memory_orchestrator;

const THREADS: usize = 16;
const ROUNDS: usize = 25;

#[test]
fn many_threads_verify_one_record() {
    let (orch, _) = memory_orchestrator();
    let mut session = orch.birth(&[0x33; 32]).unwrap();
    let record = orch.seal(&mut session, b"shared record").unwrap();
    let vectors = *session.vectors();

    let results: Vec<(usize, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    let mut accepted = 0;
                    let mut rejected = 0;
                    for _ in 0..ROUNDS {
                        if orch.verify_detached(&vectors, b"shared record", &record) {
                            accepted += 1;
                        }
                        if !orch.verify_detached(&vectors, b"shared recorD", &record) {
                            rejected += 1;
                        }
                    }
                    (accepted, rejected)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.len(), THREADS);
    assert!(results.iter().all(|&r| r == (ROUNDS, ROUNDS)));
}

#[test]
fn heal_is_consistent_under_concurrent_readers() {
    let (orch, _) = memory_orchestrator();
    let session = orch.birth(&[0x34; 32]).unwrap();
    let alpha = session.vectors().alpha;
    let beta = session.vectors().beta;
    let bogus = PublicVector::from_bytes(&[0xee; 32]).unwrap();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    assert_eq!(orch.heal(&bogus, &beta).unwrap().vector, beta);
                    assert_eq!(orch.heal(&alpha, &bogus).unwrap().vector, alpha);
                    assert!(orch.heal(&bogus, &bogus).is_err());
                }
            });
        }
    });
}

#[test]
fn births_from_many_threads_all_register() {
    let (orch, _) = memory_orchestrator();

    let sessions: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let orch = &orch;
                scope.spawn(move || orch.birth(&[i; 32]).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for session in &sessions {
        let v = session.vectors();
        assert!(orch.heal(&v.alpha, &v.beta).is_ok());
        assert!(orch.heal(&v.beta, &v.alpha).is_ok());
    }
}
