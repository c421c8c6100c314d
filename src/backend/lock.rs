//! Directory lock for the portable engine.
//!
//! Advisory exclusive lock on `<root>/LOCK` (fs2). Released on Drop.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, TwinError};

pub(crate) const LOCK_FILENAME: &str = "LOCK";

pub(crate) struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Take the lock without blocking; fails if another handle holds it.
    pub(crate) fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|e| {
            TwinError::Io(io::Error::new(
                e.kind(),
                format!("{} is locked by another handle: {}", path.display(), e),
            ))
        })?;

        Ok(Self { file, path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to unlock directory");
        }
    }
}
