//! Typed engine events.
//!
//! The orchestrator never prints. It reports what happened to an
//! [`EventSink`]; presentation layers (CLI output, mail, QR) subscribe there.

use std::sync::Mutex;

use aura_core::{Fingerprint, HealSource, SealId, VectorRole};
use aura_types::IdentityState;

#[derive(Debug, Clone, PartialEq)]
pub enum AuraEvent {
    Birth {
        seal_id: SealId,
        alpha: Fingerprint,
        beta: Fingerprint,
    },
    Restored {
        seal_id: SealId,
    },
    Sealed {
        seal_id: SealId,
        digest: String,
    },
    Verified {
        seal_id: SealId,
    },
    VerificationFailed {
        seal_id: SealId,
    },
    VectorMismatch {
        seal_id: SealId,
        role: VectorRole,
    },
    Healed {
        seal_id: SealId,
        role: VectorRole,
        source: HealSource,
        confidence: f64,
    },
    Breached {
        seal_id: SealId,
    },
    StateChanged {
        seal_id: SealId,
        from: IdentityState,
        to: IdentityState,
    },
    AuthenticityRejected {
        score: f64,
    },
    Admitted {
        data_integrity_score: f64,
        context_bound: bool,
    },
    ReferenceRecovered {
        confidence: f64,
        repaired_segments: usize,
    },
    RecoveryFailed {
        confidence: f64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: AuraEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: AuraEvent) {
        match &event {
            AuraEvent::Breached { seal_id } => {
                tracing::warn!(%seal_id, "Identity breached; re-birth required");
            }
            AuraEvent::VectorMismatch { seal_id, role } => {
                tracing::warn!(%seal_id, %role, "Healing vector mismatch");
            }
            AuraEvent::AuthenticityRejected { score } => {
                tracing::warn!(score, "Authenticity rejected");
            }
            AuraEvent::RecoveryFailed { confidence } => {
                tracing::warn!(confidence, "Recovery below floor");
            }
            AuraEvent::VerificationFailed { seal_id } => {
                tracing::info!(%seal_id, "Seal did not verify");
            }
            other => tracing::debug!(event = ?other, "Engine event"),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuraEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuraEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, matches: impl Fn(&AuraEvent) -> bool) -> bool {
        self.events
            .lock()
            .map(|events| events.iter().any(matches))
            .unwrap_or(false)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AuraEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn emit(&self, event: AuraEvent) {
        (**self).emit(event);
    }
}
