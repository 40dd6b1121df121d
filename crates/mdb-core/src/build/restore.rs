use std::path::{Path, PathBuf};

use anyhow::Context;

/// Snapshot of files edited in place for a build.
///
/// Original bytes are written back by [`RestoreGuard::restore`] or, failing
/// that, when the guard is dropped. Nothing is restored if the process dies.
#[derive(Debug, Default)]
pub struct RestoreGuard {
    saved: Vec<(PathBuf, Vec<u8>)>,
}

impl RestoreGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the current content of `path`. Only the first snapshot of a
    /// path is kept.
    pub fn track(&mut self, path: &Path) -> anyhow::Result<()> {
        if self.saved.iter().any(|(saved, _)| saved == path) {
            return Ok(());
        }
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.saved.push((path.to_path_buf(), content));
        Ok(())
    }

    /// Write every snapshot back, reporting the first failure.
    pub fn restore(mut self) -> anyhow::Result<()> {
        let mut first_error = None;
        for (path, content) in self.saved.drain(..) {
            if let Err(err) = std::fs::write(&path, &content) {
                let err = anyhow::Error::new(err)
                    .context(format!("Failed to restore {}", path.display()));
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        for (path, content) in self.saved.drain(..) {
            if let Err(err) = std::fs::write(&path, &content) {
                tracing::warn!(file = %path.display(), error = %err, "Failed to restore file");
            }
        }
    }
}
