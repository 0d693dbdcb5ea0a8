//! File-backed snapshot storage
//!
//! The snapshot lives in a single file. Writes go to a temporary file in the
//! same directory which is then renamed over the target, so a crash mid-write
//! leaves either the old or the new snapshot, never a torn one. The snapshot
//! holds credential keys, so the file is created with mode 0600 on unix.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::Storage;
use crate::error::{Error, Result};

/// Snapshot stored as one file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at `path`. Nothing is touched on disk until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path)
            .map_err(|e| Error::Io(format!("reading {}: {e}", self.path.display())))
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path, bytes)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `bytes` to `path` atomically.
///
/// The temp file is named after the target and the current process id so two
/// processes sharing a snapshot never write into the same temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io(format!("{} has no file name", path.display())))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    std::fs::write(&tmp_path, bytes)
        .map_err(|e| Error::Io(format!("writing temp snapshot {}: {e}", tmp_path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting snapshot permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        Error::Io(format!("renaming temp snapshot to {}: {e}", path.display()))
    })?;

    debug!(path = %path.display(), bytes = bytes.len(), "persisted snapshot");
    Ok(())
}
