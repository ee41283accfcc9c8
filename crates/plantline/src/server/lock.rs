//! Process-wide exclusion between plant instances.
//!
//! A plant must hold an [`InstanceLock`] before it binds its socket. The lock
//! is a file created with create-new semantics: if the file already exists,
//! another plant is running (or crashed without cleaning up) and startup
//! fails with [`Error::InstanceLocked`]. The file is removed when the lock is
//! dropped, on clean or signal-driven shutdown alike.

use plantline_core::{Error, Result};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Exclusive ownership of the plant's lock file.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Creates the lock file at `path` and records the current process ID in
    /// it.
    ///
    /// # Errors
    ///
    /// - [`Error::InstanceLocked`] if the file already exists.
    /// - [`Error::LockFile`] if it cannot be created or written.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::InstanceLocked { path });
            }
            Err(source) => return Err(Error::LockFile { path, source }),
        };

        if let Err(source) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(Error::LockFile { path, source });
        }

        tracing::debug!("Acquired instance lock {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Released instance lock {}", self.path.display()),
            Err(e) => {
                tracing::warn!(
                    "Failed to remove instance lock {}: {e}",
                    self.path.display()
                );
            }
        }
    }
}
