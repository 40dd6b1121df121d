//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub fn default_config_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("mdb");
    Ok(dir)
}

/// Directory holding per-project publish locks.
pub fn default_lock_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
        .join("mdb")
        .join("locks");
    Ok(dir)
}

pub fn config_file(config_dir: &Path) -> PathBuf {
    config_dir.join("mdb.toml")
}

pub fn token_file(config_dir: &Path) -> PathBuf {
    config_dir.join("auth")
}
