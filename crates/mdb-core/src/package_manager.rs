//! Node package manager invocation.
//!
//! Builds, tests and `init` run through npm or yarn. The choice comes from
//! the `packageManager` key in `.mdb`, falling back to lockfile detection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::{KEY_PACKAGE_MANAGER, ProjectDescriptor};

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a default `package.json`.
    async fn init(&self, cwd: &Path) -> anyhow::Result<()>;

    /// Run the `build` script.
    async fn build(&self, cwd: &Path) -> anyhow::Result<()>;

    /// Run the `test` script.
    async fn test(&self, cwd: &Path) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageManagerKind {
    #[default]
    Npm,
    Yarn,
}

impl PackageManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
        }
    }

    fn program(&self) -> &'static str {
        match (self, cfg!(windows)) {
            (Self::Npm, false) => "npm",
            (Self::Npm, true) => "npm.cmd",
            (Self::Yarn, false) => "yarn",
            (Self::Yarn, true) => "yarn.cmd",
        }
    }

    fn script_args(&self, script: &'static str) -> Vec<&'static str> {
        match self {
            Self::Npm => vec!["run", script],
            Self::Yarn => vec![script],
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManagerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "yarn" => Ok(Self::Yarn),
            other => anyhow::bail!("Unsupported package manager: {}", other),
        }
    }
}

/// Pick the package manager for a project.
pub fn detect(project_root: &Path, descriptor: &ProjectDescriptor) -> PackageManagerKind {
    if let Some(value) = descriptor.get_str(KEY_PACKAGE_MANAGER) {
        match value.parse() {
            Ok(kind) => return kind,
            Err(err) => tracing::warn!(error = %err, "Ignoring packageManager from .mdb"),
        }
    }
    if project_root.join("yarn.lock").exists() {
        PackageManagerKind::Yarn
    } else {
        PackageManagerKind::Npm
    }
}

/// Runs npm or yarn as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePackageManager {
    kind: PackageManagerKind,
}

impl NodePackageManager {
    pub fn new(kind: PackageManagerKind) -> Self {
        Self { kind }
    }

    async fn run(&self, cwd: &Path, args: &[&str]) -> anyhow::Result<()> {
        let program = self.kind.program();
        tracing::debug!(program, ?args, cwd = %cwd.display(), "Running package manager");

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .with_context(|| format!("Failed to run {}. Is it installed?", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            anyhow::bail!("{} {} failed: {}", self.kind, args.join(" "), detail);
        }
        Ok(())
    }
}

#[async_trait]
impl PackageManager for NodePackageManager {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn init(&self, cwd: &Path) -> anyhow::Result<()> {
        self.run(cwd, &["init", "-y"]).await
    }

    async fn build(&self, cwd: &Path) -> anyhow::Result<()> {
        self.run(cwd, &self.kind.script_args("build")).await
    }

    async fn test(&self, cwd: &Path) -> anyhow::Result<()> {
        self.run(cwd, &self.kind.script_args("test")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn descriptor_choice_wins_over_lockfile() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        let mut descriptor = ProjectDescriptor::load(dir.path()).unwrap();

        assert_eq!(detect(dir.path(), &descriptor), PackageManagerKind::Yarn);

        descriptor.set_value(KEY_PACKAGE_MANAGER, "npm");
        assert_eq!(detect(dir.path(), &descriptor), PackageManagerKind::Npm);
    }

    #[test]
    fn unknown_descriptor_value_falls_back_to_detection() {
        let dir = TempDir::new().unwrap();
        let mut descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        descriptor.set_value(KEY_PACKAGE_MANAGER, "pnpm");

        assert_eq!(detect(dir.path(), &descriptor), PackageManagerKind::Npm);
    }

    #[test]
    fn script_arguments_follow_tool_conventions() {
        assert_eq!(PackageManagerKind::Npm.script_args("build"), vec!["run", "build"]);
        assert_eq!(PackageManagerKind::Yarn.script_args("test"), vec!["test"]);
    }
}
