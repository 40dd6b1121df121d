//! Config store for loading and saving mdb.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{CliConfig, parser, paths};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_default_dir() -> anyhow::Result<Self> {
        Ok(Self::from_dir(paths::default_config_dir()?))
    }

    pub fn from_dir(config_dir: PathBuf) -> Self {
        let config_path = paths::config_file(&config_dir);
        Self {
            config_dir,
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn token_path(&self) -> PathBuf {
        paths::token_file(&self.config_dir)
    }

    pub fn load(&self) -> anyhow::Result<CliConfig> {
        if !self.config_path.exists() {
            return Ok(CliConfig::default());
        }
        parser::parse_mdb_toml(&self.config_path)
    }

    pub fn save(&self, config: &CliConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        std::fs::create_dir_all(&self.config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.config_dir.display()
            )
        })?;
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
