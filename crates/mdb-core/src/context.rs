//! Publish context and service wiring.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::api::PublishApi;
use crate::config::CliConfig;
use crate::git::VersionControl;
use crate::package_manager::PackageManager;
use crate::progress::Progress;
use crate::prompt::Prompter;

/// How a project gets onto the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMethod {
    /// Build locally and upload an archive.
    #[default]
    Ftp,
    /// Push to the platform's CI branch.
    Pipeline,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ftp => "ftp",
            Self::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ftp" => Ok(Self::Ftp),
            "pipeline" => Ok(Self::Pipeline),
            other => anyhow::bail!("Unknown publish method: {}. Use 'ftp' or 'pipeline'", other),
        }
    }
}

/// Kind of hosted project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Frontend,
    Backend,
    Wordpress,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Wordpress => "wordpress",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "wordpress" | "wp" => Ok(Self::Wordpress),
            other => anyhow::bail!(
                "Unknown project type: {}. Use 'frontend', 'backend' or 'wordpress'",
                other
            ),
        }
    }
}

/// WordPress admin account created on first publish.
#[derive(Clone, PartialEq, Eq)]
pub struct WpCredentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for WpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WpCredentials")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Entity-specific state threaded through every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityState {
    Frontend,
    Backend {
        platform: String,
    },
    Wordpress {
        page: String,
        credentials: Option<WpCredentials>,
    },
}

impl EntityState {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Frontend => EntityKind::Frontend,
            Self::Backend { .. } => EntityKind::Backend,
            Self::Wordpress { .. } => EntityKind::Wordpress,
        }
    }
}

/// Command-line switches that influence publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishFlags {
    /// Open the published URL in a browser.
    pub open: bool,
    /// Run the project's tests before publishing.
    pub test: bool,
    /// Explicit delivery method; wins over any stored preference.
    pub method: Option<DeliveryMethod>,
}

/// Everything a delivery strategy needs for one attempt.
///
/// Conflict resolution never edits a context in place: the `with_*` builders
/// consume the old value and return the rebuilt one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    /// Project root
    pub cwd: PathBuf,
    pub project_name: String,
    /// Starter / package id
    pub package_name: Option<String>,
    pub domain: Option<String>,
    pub entity: EntityState,
    /// Delivery method stored in `.mdb`, if any
    pub delivery_preference: Option<DeliveryMethod>,
    pub token: String,
    pub flags: PublishFlags,
}

impl PublishContext {
    pub fn new(
        cwd: impl Into<PathBuf>,
        project_name: impl Into<String>,
        entity: EntityState,
        token: impl Into<String>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            project_name: project_name.into(),
            package_name: None,
            domain: None,
            entity,
            delivery_preference: None,
            token: token.into(),
            flags: PublishFlags::default(),
        }
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    pub fn with_package_name(mut self, package_name: Option<String>) -> Self {
        self.package_name = package_name;
        self
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_delivery_preference(mut self, method: Option<DeliveryMethod>) -> Self {
        self.delivery_preference = method;
        self
    }

    pub fn with_flags(mut self, flags: PublishFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }
}

/// Shared collaborators for a publish run.
///
/// Frontends (CLI, tests) create this once and hand it to a receiver.
#[derive(Clone)]
pub struct PublishServices {
    pub config: CliConfig,
    pub api: Arc<dyn PublishApi>,
    pub vcs: Arc<dyn VersionControl>,
    pub package_manager: Arc<dyn PackageManager>,
    pub prompter: Arc<dyn Prompter>,
    pub progress: Progress,
    /// Directory holding per-project publish locks
    pub lock_dir: PathBuf,
}

impl fmt::Debug for PublishServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishServices")
            .field("config", &self.config)
            .field("package_manager", &self.package_manager.name())
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}
