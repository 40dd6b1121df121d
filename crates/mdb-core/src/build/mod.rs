//! Framework-aware build step for frontend publishes.
//!
//! The recipe is picked from the dependencies declared in `package.json`,
//! checked in a fixed order: Angular, React, Vue, then a generic fallback.
//! Every recipe leaves its output in `dist/` (the generic one may leave it in
//! `build/`). Projects without a `build` script are uploaded as-is.

mod angular;
mod generic;
mod react;
mod restore;
mod vue;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{BuildManifest, PackageJson};
use crate::error::PublishError;
use crate::package_manager::PackageManager;

pub use restore::RestoreGuard;

/// Canonical output directory.
pub const DIST_DIR: &str = "dist";

/// Intermediate name used while normalizing output locations.
pub const STAGING_DIR: &str = ".mdb-dist-tmp";

/// Framework-specific build procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    Angular,
    React,
    Vue,
    Generic,
}

impl Recipe {
    /// Dependency markers in precedence order.
    const MARKERS: [(&'static str, Recipe); 3] = [
        ("@angular/core", Recipe::Angular),
        ("react", Recipe::React),
        ("vue", Recipe::Vue),
    ];

    pub fn detect(manifest: &BuildManifest) -> Self {
        Self::MARKERS
            .iter()
            .find(|(marker, _)| manifest.has_dependency(marker))
            .map(|(_, recipe)| *recipe)
            .unwrap_or(Recipe::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angular => "angular",
            Self::React => "react",
            Self::Vue => "vue",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every recipe.
#[derive(Clone, Copy)]
pub struct BuildJob<'a> {
    pub cwd: &'a Path,
    pub project_name: &'a str,
    /// Bearer token; React reads the username from it
    pub token: &'a str,
    pub projects_domain: &'a str,
    pub package_manager: &'a dyn PackageManager,
}

impl fmt::Debug for BuildJob<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildJob")
            .field("cwd", &self.cwd)
            .field("project_name", &self.project_name)
            .field("projects_domain", &self.projects_domain)
            .field("package_manager", &self.package_manager.name())
            .finish_non_exhaustive()
    }
}

/// Outcome of a build that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub recipe: Recipe,
    pub output_dir: PathBuf,
    /// Non-fatal notes for the user
    pub warnings: Vec<String>,
}

/// Run the matching recipe. `Ok(None)` means there was nothing to build.
pub async fn run_build(job: BuildJob<'_>) -> Result<Option<BuildReport>, PublishError> {
    let Some(package) = PackageJson::load(job.cwd).map_err(build_error)? else {
        tracing::debug!(cwd = %job.cwd.display(), "No package.json; skipping build");
        return Ok(None);
    };
    let manifest = package.manifest().map_err(build_error)?;
    if manifest.build_script().is_none() {
        tracing::debug!("No build script declared; skipping build");
        return Ok(None);
    }

    let recipe = Recipe::detect(&manifest);
    tracing::debug!(%recipe, "Running build recipe");

    let report = match recipe {
        Recipe::Angular => angular::run(job).await?,
        Recipe::React => react::run(job).await?,
        Recipe::Vue => vue::run(job).await?,
        Recipe::Generic => generic::run(job).await?,
    };
    tracing::debug!(output = %report.output_dir.display(), "Build finished");
    Ok(Some(report))
}

async fn run_package_build(job: &BuildJob<'_>) -> Result<(), PublishError> {
    job.package_manager
        .build(job.cwd)
        .await
        .map_err(build_error)
}

fn build_error(err: anyhow::Error) -> PublishError {
    PublishError::build(format!("{:#}", err))
}

/// Move `output` to `<cwd>/dist` through [`STAGING_DIR`].
///
/// Going through the staging name lets `output` live anywhere, including
/// inside an existing `dist/`.
fn relocate_to_dist(cwd: &Path, output: &Path) -> anyhow::Result<PathBuf> {
    let dist = cwd.join(DIST_DIR);
    if output == dist {
        return Ok(dist);
    }

    let staging = cwd.join(STAGING_DIR);
    remove_dir_if_exists(&staging)?;
    std::fs::rename(output, &staging).with_context(|| {
        format!(
            "Failed to move {} to {}",
            output.display(),
            staging.display()
        )
    })?;
    remove_dir_if_exists(&dist)?;
    std::fs::rename(&staging, &dist)
        .with_context(|| format!("Failed to move build output to {}", dist.display()))?;
    Ok(dist)
}

fn remove_dir_if_exists(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}
