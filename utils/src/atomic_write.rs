//! Atomic file write helpers.
//!
//! Key material and oracle snapshots are written through a temp file in the
//! destination directory and renamed into place, so a crash never leaves a
//! half-written anchor behind. Permissions are applied to the temp file before
//! any bytes are written.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Owner read/write only (0o600 on Unix). Used for private anchors.
    #[default]
    OwnerOnly,
    /// Owner read/write, world readable (0o644 on Unix). Used for public vectors.
    PublicRead,
}

impl PersistMode {
    #[cfg(unix)]
    #[must_use]
    pub fn mode(self) -> u32 {
        match self {
            Self::OwnerOnly => 0o600,
            Self::PublicRead => 0o644,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    /// File sync policy for the temp file before it is renamed.
    pub file_sync: FileSyncPolicy,
    /// Sync the parent directory after the rename (best effort).
    pub sync_parent_dir: bool,
    pub mode: PersistMode,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            sync_parent_dir: true,
            mode: PersistMode::OwnerOnly,
        }
    }
}

impl AtomicWriteOptions {
    #[must_use]
    pub fn with_mode(mode: PersistMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(options.mode.mode()))?;
    }

    tmp.write_all(bytes)?;
    if matches!(options.file_sync, FileSyncPolicy::SyncAll) {
        tmp.as_file().sync_all()?;
    }

    tmp.persist(path).map_err(|err| err.error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(options.mode.mode()))?;
    }

    if options.sync_parent_dir {
        best_effort_sync_parent_dir(parent);
    }

    Ok(())
}

#[cfg(unix)]
fn best_effort_sync_parent_dir(parent: &Path) {
    if let Err(e) = fs::File::open(parent).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %parent.display(), "Parent directory sync_all failed (best-effort): {e}");
    }
}

#[cfg(not(unix))]
fn best_effort_sync_parent_dir(_parent: &Path) {}
