//! Shared infrastructure utilities for AuraSeal.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename) with an
//!   explicit permission policy for key material
//! - **`permissions`**: Owner-only directory enforcement and ownership checks

pub mod atomic_write;
pub mod permissions;

pub use atomic_write::{AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write_with_options};
pub use permissions::{ensure_owner_only_dir, is_owner_only_file};
