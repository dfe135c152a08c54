//! Seal, verify and heal identities; admit data/process pairs; recover
//! protected references.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use aura_config::EngineSettings;
use aura_core::{
    CoreError, DerivedIdentity, Fingerprint, HealSource, HealingCoordinator, IdentitySession,
    LedgerEntry, LedgerViolation, MembershipOracle, OracleSnapshot, PublicVector,
    RecoveredVector, SealCodec, SealId, SealLedger, SealRecord, VectorKeyDeriver, VectorLabels,
    VectorPair, VectorRole,
};
use aura_integrity::{
    AlgorithmEncoding, AuthenticityResult, BinaryEncodingProcessor, CorruptionAnalysis,
    CorruptionRecoverySystem, DataEncoding, DetectOutcome, ExecutionCoordinate,
    ExecutionCoordinateMapper, IsomorphicValidationEngine, ProcessDescriptor, ValidationOutcome,
};
use aura_types::{IdentityEvent, IdentityState};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::{AuraEvent, EngineError, EventSink, KEY_MAPPING, KeyStore, TracingSink};

const RANDOM_ENTROPY_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerificationOutcome {
    /// Both co-signatures verified under the presented vectors.
    Verified,
    /// One presented vector was unusable; the record verified under the
    /// vector that healing recovered.
    Healed {
        role: VectorRole,
        source: HealSource,
        confidence: f64,
    },
    Rejected,
}

impl VerificationOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityInfo {
    pub seal_id: SealId,
    pub state: IdentityState,
    pub fingerprint_alpha: Fingerprint,
    pub fingerprint_beta: Fingerprint,
    pub labels: VectorLabels,
    pub key_mapping: &'static str,
    pub location: Option<PathBuf>,
}

/// A data/process pair that passed cross-validation and coordinate mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedExecutionContext {
    pub data: Vec<u8>,
    pub descriptor: ProcessDescriptor,
    pub data_integrity_score: f64,
    pub algorithm_authenticity: f64,
    pub coordinate: ExecutionCoordinate,
    pub context_bound_execution_ready: bool,
    /// Either encoding needed recovery before it could be used.
    pub recovered: bool,
}

/// Payload of a protected reference after detection and re-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredPayload {
    pub payload: Vec<u8>,
    pub analysis: CorruptionAnalysis,
    pub authenticity: AuthenticityResult,
    pub recovery_confidence: f64,
    pub repaired_segments: Vec<usize>,
    pub reconstructed: bool,
}

pub struct Orchestrator {
    settings: EngineSettings,
    deriver: VectorKeyDeriver,
    codec: SealCodec,
    oracle: RwLock<MembershipOracle>,
    ledger: Mutex<SealLedger>,
    store: Box<dyn KeyStore>,
    events: Box<dyn EventSink>,
    processor: BinaryEncodingProcessor,
    validator: IsomorphicValidationEngine,
    recovery: CorruptionRecoverySystem,
    mapper: ExecutionCoordinateMapper,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build an orchestrator over `store`, restoring the membership oracle
    /// from it when a snapshot exists.
    pub fn new(settings: EngineSettings, store: impl KeyStore + 'static) -> Result<Self, EngineError> {
        let oracle = match store.load_oracle()? {
            Some(snapshot) => MembershipOracle::restore(snapshot)?,
            None => MembershipOracle::default(),
        };
        tracing::debug!(
            vectors = oracle.len(),
            slices = oracle.slice_count(),
            "Membership oracle ready"
        );

        Ok(Self {
            deriver: VectorKeyDeriver::new(settings.labels.clone()),
            codec: SealCodec::new(settings.labels.clone()),
            oracle: RwLock::new(oracle),
            ledger: Mutex::new(SealLedger::new()),
            store: Box::new(store),
            events: Box::new(TracingSink),
            processor: BinaryEncodingProcessor::new(settings.patterns.clone()),
            validator: IsomorphicValidationEngine::new(settings.coherence),
            recovery: CorruptionRecoverySystem::new(settings.corruption, settings.segment_size),
            mapper: ExecutionCoordinateMapper,
            settings,
        })
    }

    #[must_use]
    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_recovery(mut self, recovery: CorruptionRecoverySystem) -> Self {
        self.recovery = recovery;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn oracle(&self) -> RwLockReadGuard<'_, MembershipOracle> {
        self.oracle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn oracle_mut(&self) -> RwLockWriteGuard<'_, MembershipOracle> {
        self.oracle.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger(&self) -> MutexGuard<'_, SealLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derive and persist a new identity.
    ///
    /// Registration happens on a staged copy of the oracle that only replaces
    /// the live one once the identity and snapshot are stored.
    pub fn birth(&self, entropy: &[u8]) -> Result<IdentitySession, EngineError> {
        let mut oracle = self.oracle_mut();
        let mut staged = oracle.clone();
        let identity = self.deriver.derive(entropy, &mut staged)?;
        self.persist(&identity, &staged)?;
        self.store.set_active(identity.vectors.seal_id())?;
        *oracle = staged;
        drop(oracle);

        self.events.emit(AuraEvent::Birth {
            seal_id: identity.vectors.seal_id(),
            alpha: identity.vectors.alpha.fingerprint(),
            beta: identity.vectors.beta.fingerprint(),
        });
        Ok(IdentitySession::born(identity))
    }

    /// Birth from 64 bytes of OS randomness.
    pub fn birth_random(&self) -> Result<IdentitySession, EngineError> {
        let entropy = Zeroizing::new(rand::random::<[u8; RANDOM_ENTROPY_LEN]>());
        self.birth(entropy.as_slice())
    }

    fn persist(&self, identity: &DerivedIdentity, oracle: &MembershipOracle) -> Result<(), EngineError> {
        self.store
            .save_identity(identity, self.settings.signature_algorithm)?;
        self.store.save_oracle(&oracle.snapshot())?;
        Ok(())
    }

    /// Load a stored identity. Its vectors are re-registered if the oracle
    /// snapshot predates them.
    pub fn restore(&self, seal_id: SealId) -> Result<IdentitySession, EngineError> {
        let identity = self.store.load_identity(seal_id)?;

        let needs_registration = {
            let oracle = self.oracle();
            !oracle.is_valid(&identity.vectors.alpha) || !oracle.is_valid(&identity.vectors.beta)
        };
        if needs_registration {
            let mut oracle = self.oracle_mut();
            let mut staged = oracle.clone();
            staged.register(&identity.vectors.alpha);
            staged.register(&identity.vectors.beta);
            self.store.save_oracle(&staged.snapshot())?;
            *oracle = staged;
            tracing::info!(%seal_id, "Re-registered restored vectors");
        }

        self.events.emit(AuraEvent::Restored { seal_id });
        Ok(IdentitySession::restored(identity))
    }

    /// Restore the active identity, falling back to the most recently born
    /// one. Births a new identity when the store holds none.
    pub fn load_or_birth(&self) -> Result<IdentitySession, EngineError> {
        let stored = self.store.list_identities()?;
        let active = self.store.active_identity()?;
        let chosen = match active {
            Some(seal_id) if stored.contains(&seal_id) => Some(seal_id),
            Some(seal_id) => {
                tracing::warn!(%seal_id, "Active identity is missing; using the newest");
                stored.last().copied()
            }
            None => stored.last().copied(),
        };
        match chosen {
            Some(seal_id) => self.restore(seal_id),
            None => {
                tracing::info!("No stored identity; performing birth");
                self.birth_random()
            }
        }
    }

    fn transition(&self, session: &mut IdentitySession, event: IdentityEvent) -> Result<(), EngineError> {
        if !session.accepts(event) {
            tracing::debug!(state = %session.state(), ?event, "Transition not applicable");
            return Ok(());
        }
        let from = session.state();
        let to = session.apply(event)?;
        if from != to {
            self.events.emit(AuraEvent::StateChanged {
                seal_id: session.seal_id(),
                from,
                to,
            });
        }
        Ok(())
    }

    /// Seal under the labels the session's identity was derived with, which
    /// may differ from the configured ones for a restored identity.
    pub fn seal(&self, session: &mut IdentitySession, payload: &[u8]) -> Result<SealRecord, EngineError> {
        session.ensure_active()?;
        let record = SealCodec::new(session.labels().clone())
            .seal(session.anchor(), session.vectors(), payload)
            .map_err(CoreError::from)?;
        self.transition(session, IdentityEvent::Sealed)?;
        self.ledger().record(&record);

        self.events.emit(AuraEvent::Sealed {
            seal_id: session.seal_id(),
            digest: record.digest_hex(),
        });
        Ok(record)
    }

    /// Verify `record` with the vectors a counterparty presented.
    ///
    /// When the full pair does not verify and differs from the identity's
    /// own vectors, healing picks the membership-valid one and the record is
    /// checked against that vector's co-signature alone. The co-signature is
    /// chosen by the record fingerprint the vector matches, not by the slot it
    /// was presented in. Neither vector valid breaches the identity.
    pub fn verify(
        &self,
        session: &mut IdentitySession,
        presented: &VectorPair,
        payload: &[u8],
        record: &SealRecord,
    ) -> Result<VerificationOutcome, EngineError> {
        session.ensure_active()?;
        let seal_id = session.seal_id();

        if self.codec.verify(presented, payload, record) {
            self.transition(session, IdentityEvent::Verified)?;
            self.events.emit(AuraEvent::Verified { seal_id });
            return Ok(VerificationOutcome::Verified);
        }

        if presented == session.vectors() {
            self.events.emit(AuraEvent::VerificationFailed { seal_id });
            return Ok(VerificationOutcome::Rejected);
        }

        let role = if presented.alpha == session.vectors().alpha {
            VectorRole::Beta
        } else {
            VectorRole::Alpha
        };
        self.events.emit(AuraEvent::VectorMismatch { seal_id, role });

        let recovered = match self.heal(&presented.alpha, &presented.beta) {
            Ok(recovered) => recovered,
            Err(EngineError::Core(CoreError::DualVectorCorruption)) => {
                self.transition(session, IdentityEvent::VectorMismatch)?;
                self.transition(session, IdentityEvent::BothVectorsInvalid)?;
                self.events.emit(AuraEvent::Breached { seal_id });
                return Err(CoreError::DualVectorCorruption.into());
            }
            Err(other) => return Err(other),
        };

        let fingerprint = recovered.vector.fingerprint();
        let Some(healed_role) = [VectorRole::Alpha, VectorRole::Beta]
            .into_iter()
            .find(|role| record.fingerprint(*role).matches(&fingerprint))
        else {
            tracing::debug!(%seal_id, "Recovered vector matches neither record fingerprint");
            self.events.emit(AuraEvent::VerificationFailed { seal_id });
            return Ok(VerificationOutcome::Rejected);
        };
        if !self
            .codec
            .verify_with_vector(&recovered.vector, healed_role, payload, record)
        {
            self.events.emit(AuraEvent::VerificationFailed { seal_id });
            return Ok(VerificationOutcome::Rejected);
        }

        self.transition(session, IdentityEvent::VectorMismatch)?;
        self.transition(session, IdentityEvent::Healed)?;
        self.events.emit(AuraEvent::Healed {
            seal_id,
            role: healed_role,
            source: recovered.source,
            confidence: recovered.confidence,
        });
        Ok(VerificationOutcome::Healed {
            role: healed_role,
            source: recovered.source,
            confidence: recovered.confidence,
        })
    }

    /// Stateless verification for third parties. Safe to call from many
    /// threads at once.
    #[must_use]
    pub fn verify_detached(&self, vectors: &VectorPair, payload: &[u8], record: &SealRecord) -> bool {
        self.codec.verify(vectors, payload, record)
    }

    /// Verify one co-signature under a single vector.
    #[must_use]
    pub fn verify_single(
        &self,
        vector: &PublicVector,
        role: VectorRole,
        payload: &[u8],
        record: &SealRecord,
    ) -> bool {
        self.codec.verify_with_vector(vector, role, payload, record)
    }

    pub fn heal(
        &self,
        known_good: &PublicVector,
        candidate: &PublicVector,
    ) -> Result<RecoveredVector, EngineError> {
        let oracle = self.oracle();
        Ok(HealingCoordinator::new(&oracle).heal(known_good, candidate)?)
    }

    #[must_use]
    pub fn identity_info(&self, session: &IdentitySession) -> IdentityInfo {
        let seal_id = session.seal_id();
        IdentityInfo {
            seal_id,
            state: session.state(),
            fingerprint_alpha: session.vectors().alpha.fingerprint(),
            fingerprint_beta: session.vectors().beta.fingerprint(),
            labels: session.labels().clone(),
            key_mapping: KEY_MAPPING,
            location: self.store.location(seal_id),
        }
    }

    #[must_use]
    pub fn oracle_snapshot(&self) -> OracleSnapshot {
        self.oracle().snapshot()
    }

    #[must_use]
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger().entries().into_iter().cloned().collect()
    }

    pub fn ledger_integrity(&self) -> Result<(), LedgerViolation> {
        self.ledger().verify_integrity()
    }

    #[must_use]
    pub fn encode_data(&self, payload: &[u8]) -> DataEncoding {
        self.processor.encode_data(payload)
    }

    pub fn encode_algorithm(
        &self,
        descriptor: &ProcessDescriptor,
    ) -> Result<AlgorithmEncoding, EngineError> {
        Ok(self.processor.encode_algorithm(descriptor)?)
    }

    /// Accept a validation outcome, or fail with the partial result when
    /// recovery confidence is under the floor.
    fn accept(&self, outcome: ValidationOutcome) -> Result<(Vec<u8>, f64, bool), EngineError> {
        let floor = self.settings.recovery_floor;
        match outcome {
            ValidationOutcome::Valid { matrix, logical } => {
                Ok((logical.into_bytes(), matrix.validation_score, false))
            }
            ValidationOutcome::Recovered(result) if floor.is_met_by(result.recovery_confidence) => {
                Ok((result.logical.into_bytes(), result.recovery_confidence, true))
            }
            ValidationOutcome::Recovered(result) => {
                self.events.emit(AuraEvent::RecoveryFailed {
                    confidence: result.recovery_confidence,
                });
                Err(EngineError::CorruptionRecoveryFailure {
                    partial: result.logical.into_bytes(),
                    confidence: result.recovery_confidence,
                    floor,
                })
            }
        }
    }

    /// Cross-validate a data encoding against the process encoding bound to
    /// it and map the pair to its admission coordinate.
    pub fn admit(
        &self,
        data: &DataEncoding,
        algorithm: &AlgorithmEncoding,
    ) -> Result<AuthenticatedExecutionContext, EngineError> {
        let (payload, data_integrity_score, data_recovered) =
            self.accept(self.processor.validate(&data.pair))?;
        let (descriptor, _, algorithm_recovered) =
            self.accept(self.processor.validate(&algorithm.pair))?;
        let descriptor = ProcessDescriptor::from_bytes(&descriptor)?;

        let data_vector = ProcessDescriptor::binding_for(&payload);
        let binding = descriptor.binding_vector();
        let handshake = self.validator.validate_compatibility(&data_vector, &binding);
        if !handshake.is_authentic {
            self.events.emit(AuraEvent::AuthenticityRejected {
                score: handshake.integrity_score,
            });
            let (data, algorithm) = handshake.offending.unwrap_or((data_vector, binding));
            return Err(EngineError::AuthenticityValidation {
                data,
                algorithm,
                score: handshake.integrity_score,
            });
        }

        let coordinate = self.mapper.map(&data_vector, &binding);
        self.events.emit(AuraEvent::Admitted {
            data_integrity_score,
            context_bound: coordinate.alignment,
        });
        Ok(AuthenticatedExecutionContext {
            data: payload,
            descriptor,
            data_integrity_score,
            algorithm_authenticity: handshake.authenticity_score,
            context_bound_execution_ready: coordinate.alignment,
            coordinate,
            recovered: data_recovered || algorithm_recovered,
        })
    }

    pub fn protect_reference(&self, payload: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(self.recovery.protect(payload)?)
    }

    /// Detect damage in a protected reference, reconstruct it when needed and
    /// re-validate the result before handing the payload out.
    pub fn recover_reference(&self, reference: &[u8]) -> Result<RecoveredPayload, EngineError> {
        let (analysis, result, reconstructed) = match self.recovery.detect(reference)? {
            DetectOutcome::Reconstructed { analysis, result } => (analysis, result, true),
            DetectOutcome::Clean(analysis) => {
                let result = self.recovery.reconstruct(reference, &analysis)?;
                (analysis, result, false)
            }
        };

        let floor = self.settings.recovery_floor;
        if !floor.is_met_by(result.recovery_confidence) {
            self.events.emit(AuraEvent::RecoveryFailed {
                confidence: result.recovery_confidence,
            });
            return Err(EngineError::CorruptionRecoveryFailure {
                partial: result.unvalidated_bytes().to_vec(),
                confidence: result.recovery_confidence,
                floor,
            });
        }

        let recovery_confidence = result.recovery_confidence;
        let repaired_segments = result.repaired_segments.clone();
        match result.into_validated(&self.validator) {
            Ok(validated) => {
                if reconstructed {
                    self.events.emit(AuraEvent::ReferenceRecovered {
                        confidence: recovery_confidence,
                        repaired_segments: repaired_segments.len(),
                    });
                }
                Ok(RecoveredPayload {
                    payload: validated.payload,
                    analysis,
                    authenticity: validated.authenticity,
                    recovery_confidence,
                    repaired_segments,
                    reconstructed,
                })
            }
            Err((_, rejected)) => {
                self.events.emit(AuraEvent::AuthenticityRejected {
                    score: rejected.integrity_score,
                });
                let score = rejected.integrity_score;
                let (data, algorithm) = rejected.offending.unwrap_or_default();
                Err(EngineError::AuthenticityValidation {
                    data,
                    algorithm,
                    score,
                })
            }
        }
    }
}
