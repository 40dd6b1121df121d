//! Per-project publish lock.
//!
//! Lock files live outside the project (so they are never archived or seen by
//! `git status`) and are keyed by a hash of the canonical project path.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::PublishError;

/// Held for the duration of one publish; removes the lock file on drop.
#[derive(Debug)]
pub struct PublishLock {
    path: PathBuf,
}

impl PublishLock {
    pub fn acquire(lock_dir: &Path, project_root: &Path) -> Result<Self, PublishError> {
        std::fs::create_dir_all(lock_dir)
            .with_context(|| format!("Failed to create lock directory: {}", lock_dir.display()))?;

        let path = lock_path(lock_dir, project_root);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PublishError::Locked {
                    project_root: project_root.to_path_buf(),
                    lock_file: path,
                });
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to create lock file: {}", path.display()))
                    .into());
            }
        };

        // Owner info only helps humans clean up stale locks.
        let _ = writeln!(
            file,
            "pid={}\nstarted={}\nproject={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339(),
            project_root.display()
        );

        tracing::debug!(lock = %path.display(), "Acquired publish lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %err, "Failed to remove publish lock");
        }
    }
}

fn lock_path(lock_dir: &Path, project_root: &Path) -> PathBuf {
    let canonical = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes());
    lock_dir.join(format!("{}.lock", &hash.to_hex()[..32]))
}
