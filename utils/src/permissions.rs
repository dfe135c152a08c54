//! Owner-only permission enforcement for key storage.

use std::io;
use std::path::Path;

/// Create `path` (and parents) and tighten it to 0o700 when we own it.
///
/// Directories owned by another user are left untouched; the caller decides
/// whether that is acceptable.
pub fn ensure_owner_only_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let metadata = std::fs::metadata(path)?;

        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            return Ok(());
        }

        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                "Key directory permissions are too open ({:o}); tightening to 0700",
                mode
            );
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// True when the file is owned by the current user and not readable by
/// group or others. Always true on platforms without Unix modes.
pub fn is_owner_only_file(path: &Path) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let metadata = std::fs::metadata(path)?;
        let our_uid = unsafe { libc::getuid() };
        let mode = metadata.permissions().mode() & 0o777;
        Ok(metadata.uid() == our_uid && mode & 0o077 == 0)
    }

    #[cfg(not(unix))]
    {
        std::fs::metadata(path).map(|_| true)
    }
}
