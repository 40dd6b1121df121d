//! Configuration for the publish subsystem
//!
//! Three sources feed a publish:
//! - Global: `~/.config/mdb/mdb.toml` (API host, platform domains, CI branch)
//! - Project descriptor: `.mdb` in the project root (name, domain, preferences)
//! - Ambient manifest: `package.json` (dependencies, scripts, name)

pub mod descriptor;
pub mod manifest;
pub mod parser;
pub mod paths;
pub mod store;

use serde::{Deserialize, Serialize};

pub use descriptor::{
    DESCRIPTOR_FILE, KEY_BACKEND_PLATFORM, KEY_DOMAIN, KEY_NAME, KEY_PACKAGE_MANAGER,
    KEY_PUBLISH_METHOD, KEY_STARTER, KEY_TYPE, KEY_WORDPRESS_PAGE, ProjectDescriptor,
};
pub use manifest::{BuildManifest, MANIFEST_FILE, PackageJson};
pub use parser::{parse_mdb_toml, parse_mdb_toml_str, to_toml};
pub use paths::{config_file, default_config_dir, default_lock_dir, token_file};
pub use store::ConfigStore;

pub const DEFAULT_API_HOST: &str = "https://apps-backend.mdbgo.com";
pub const DEFAULT_PROJECTS_DOMAIN: &str = "mdbgo.io";
pub const DEFAULT_GIT_HOST: &str = "git.mdbgo.com";
pub const DEFAULT_PUBLIC_BRANCH: &str = "public";

/// Environment variable overriding `api_host`.
pub const API_HOST_ENV: &str = "MDB_API_HOST";

/// Root structure of mdb.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Base URL of the platform API
    pub api_host: String,
    /// Domain under which published projects are served
    pub projects_domain: String,
    /// Host of the platform's git server (pipeline publishing)
    pub git_host: String,
    /// Branch watched by the platform's CI
    pub public_branch: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            projects_domain: DEFAULT_PROJECTS_DOMAIN.to_string(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            public_branch: DEFAULT_PUBLIC_BRANCH.to_string(),
        }
    }
}

impl CliConfig {
    /// Validate values that the publish flow depends on.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api_host)
            .map_err(|e| anyhow::anyhow!("Invalid api_host '{}': {}", self.api_host, e))?;
        if self.public_branch.trim().is_empty() {
            anyhow::bail!("public_branch must not be empty");
        }
        if self.projects_domain.trim().is_empty() {
            anyhow::bail!("projects_domain must not be empty");
        }
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var(API_HOST_ENV) {
            if !host.trim().is_empty() {
                self.api_host = host.trim().to_string();
            }
        }
        self
    }

    /// Suffix every platform subdomain carries, e.g. `.mdbgo.io`.
    pub fn subdomain_suffix(&self) -> String {
        format!(".{}", self.projects_domain)
    }
}
