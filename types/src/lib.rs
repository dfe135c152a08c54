//! Core domain types for AuraSeal.
//!
//! This crate contains pure domain types with no IO, no crypto, and minimal dependencies.
//! Everything here can be used from any layer of the workspace.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod bits;
mod state;
mod threshold;

pub use bits::{BitPattern, BitVector, BitsError};
pub use state::{IdentityEvent, IdentityState};
pub use threshold::{Threshold, ThresholdError};
