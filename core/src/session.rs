//! Per-identity session: the anchor plus its lifecycle state.

use aura_types::{IdentityEvent, IdentityState};
use tracing::info;

use crate::{CoreError, DerivedIdentity, PrivateAnchor, SealId, VectorLabels, VectorPair};

/// Owns the anchor for the lifetime of one identity.
///
/// Sealing takes `&mut self` upstream, so one anchor is never used by two
/// sealing calls at once. The anchor is zeroized when the session drops.
#[derive(Debug)]
pub struct IdentitySession {
    anchor: PrivateAnchor,
    vectors: VectorPair,
    labels: VectorLabels,
    state: IdentityState,
}

impl IdentitySession {
    /// A freshly derived identity, in `Birth`.
    #[must_use]
    pub fn born(identity: DerivedIdentity) -> Self {
        Self::with_state(identity, IdentityState::Birth)
    }

    /// An identity loaded from storage. It has sealed before, so it starts in
    /// `Sealed` and can verify immediately.
    #[must_use]
    pub fn restored(identity: DerivedIdentity) -> Self {
        Self::with_state(identity, IdentityState::Sealed)
    }

    fn with_state(identity: DerivedIdentity, state: IdentityState) -> Self {
        let DerivedIdentity {
            anchor,
            vectors,
            labels,
        } = identity;
        Self {
            anchor,
            vectors,
            labels,
            state,
        }
    }

    #[must_use]
    pub fn anchor(&self) -> &PrivateAnchor {
        &self.anchor
    }

    #[must_use]
    pub fn vectors(&self) -> &VectorPair {
        &self.vectors
    }

    #[must_use]
    pub fn labels(&self) -> &VectorLabels {
        &self.labels
    }

    #[must_use]
    pub fn seal_id(&self) -> SealId {
        self.vectors.seal_id()
    }

    #[must_use]
    pub fn state(&self) -> IdentityState {
        self.state
    }

    /// Refuse any work on a breached identity.
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        if self.state.is_terminal() {
            return Err(CoreError::Breached {
                seal_id: self.seal_id(),
            });
        }
        Ok(())
    }

    /// Whether `event` would be accepted from the current state.
    #[must_use]
    pub fn accepts(&self, event: IdentityEvent) -> bool {
        self.state.apply(event).is_some()
    }

    pub fn apply(&mut self, event: IdentityEvent) -> Result<IdentityState, CoreError> {
        let next = self
            .state
            .apply(event)
            .ok_or(CoreError::InvalidTransition {
                from: self.state,
                event,
            })?;
        if next != self.state {
            info!(
                seal_id = %self.seal_id(),
                from = %self.state,
                to = %next,
                "Identity state changed"
            );
        }
        self.state = next;
        Ok(next)
    }
}
