//! AuraSeal engine.
//!
//! Composes the sealing core and the integrity subsystem into the two
//! pipelines hosting tools call:
//!
//! ```text
//! birth -> seal -> verify --(vector mismatch)--> heal -> verify_with_vector
//!                                              \--(neither valid)--> breach
//!
//! encode_data + encode_algorithm -> admit -> AuthenticatedExecutionContext
//! protect_reference -> recover_reference (detect, reconstruct, re-validate)
//! ```
//!
//! Persistence goes through a [`KeyStore`] handed to the [`Orchestrator`];
//! everything observable goes out as [`AuraEvent`]s through an [`EventSink`].

mod error;
mod events;
mod key_store;
mod orchestrator;

pub use error::EngineError;
pub use events::{AuraEvent, EventSink, RecordingSink, TracingSink};
pub use key_store::{
    FileKeyStore, KEY_MAPPING, KeyStore, MemoryKeyStore, PublicVectorsFile, StoreError,
};
pub use orchestrator::{
    AuthenticatedExecutionContext, IdentityInfo, Orchestrator, RecoveredPayload,
    VerificationOutcome,
};
