use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use super::{BuildJob, BuildReport, Recipe, build_error, relocate_to_dist, run_package_build};
use crate::error::PublishError;

const WORKSPACE_FILE: &str = "angular.json";
const ABSOLUTE_BASE: &str = r#"<base href="/">"#;
const RELATIVE_BASE: &str = r#"<base href="./">"#;

pub(super) async fn run(job: BuildJob<'_>) -> Result<BuildReport, PublishError> {
    let output_path = configured_output_path(job.cwd).map_err(build_error)?;
    run_package_build(&job).await?;

    let output = job.cwd.join(&output_path);
    let served = find_index_dir(&output).ok_or_else(|| {
        PublishError::build(format!(
            "Angular build finished but no index.html was found in {}",
            output.display()
        ))
    })?;

    let mut warnings = Vec::new();
    if !rewrite_base_href(&served.join("index.html")).map_err(build_error)? {
        warnings.push(format!(
            "index.html in {} has no {}; asset paths were left untouched",
            output_path,
            ABSOLUTE_BASE
        ));
    }

    let dist = relocate_to_dist(job.cwd, &served).map_err(build_error)?;
    Ok(BuildReport {
        recipe: Recipe::Angular,
        output_dir: dist,
        warnings,
    })
}

/// `outputPath` of the default project (or the first one) in `angular.json`.
fn configured_output_path(cwd: &Path) -> anyhow::Result<String> {
    let path = cwd.join(WORKSPACE_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let workspace: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let projects = workspace
        .get("projects")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow::anyhow!("{} declares no projects", WORKSPACE_FILE))?;
    let project = workspace
        .get("defaultProject")
        .and_then(Value::as_str)
        .and_then(|name| projects.get(name))
        .or_else(|| projects.values().next())
        .ok_or_else(|| anyhow::anyhow!("{} declares no projects", WORKSPACE_FILE))?;

    let output = project
        .pointer("/architect/build/options/outputPath")
        .ok_or_else(|| anyhow::anyhow!("{} has no build outputPath", WORKSPACE_FILE))?;
    // Newer workspaces use `{ "base": "dist/app" }`.
    let output = match output {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("base")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("outputPath object has no 'base'"))?,
        _ => anyhow::bail!("outputPath in {} is not a string", WORKSPACE_FILE),
    };
    Ok(output)
}

fn find_index_dir(output: &Path) -> Option<PathBuf> {
    [output.to_path_buf(), output.join("browser")]
        .into_iter()
        .find(|dir| dir.join("index.html").is_file())
}

/// Returns `false` when the index has no absolute base href.
fn rewrite_base_href(index: &Path) -> anyhow::Result<bool> {
    let html = std::fs::read_to_string(index)
        .with_context(|| format!("Failed to read {}", index.display()))?;
    if !html.contains(ABSOLUTE_BASE) {
        return Ok(false);
    }
    std::fs::write(index, html.replacen(ABSOLUTE_BASE, RELATIVE_BASE, 1))
        .with_context(|| format!("Failed to write {}", index.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::MockPackageManager;
    use tempfile::TempDir;

    const WORKSPACE: &str = r#"{
        "defaultProject": "shop",
        "projects": {
            "admin": {"architect": {"build": {"options": {"outputPath": "out/admin"}}}},
            "shop": {"architect": {"build": {"options": {"outputPath": {"base": "dist/shop"}}}}}
        }
    }"#;

    #[test]
    fn reads_default_project_output() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(WORKSPACE_FILE), WORKSPACE).unwrap();

        assert_eq!(configured_output_path(dir.path()).unwrap(), "dist/shop");
    }

    #[tokio::test]
    async fn rewrites_base_and_normalizes_to_dist() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(WORKSPACE_FILE), WORKSPACE).unwrap();

        let mut pm = MockPackageManager::new();
        pm.expect_build().times(1).returning(|cwd| {
            let browser = cwd.join("dist/shop/browser");
            std::fs::create_dir_all(&browser)?;
            std::fs::write(
                browser.join("index.html"),
                r#"<head><base href="/"></head>"#,
            )?;
            Ok(())
        });

        let report = run(BuildJob {
            cwd: dir.path(),
            project_name: "shop",
            token: "t",
            projects_domain: "mdbgo.io",
            package_manager: &pm,
        })
        .await
        .unwrap();

        let index = std::fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
        assert_eq!(index, r#"<head><base href="./"></head>"#);
        assert_eq!(report.output_dir, dir.path().join("dist"));
        assert!(report.warnings.is_empty());
        assert!(!dir.path().join(super::super::STAGING_DIR).exists());
    }

    #[tokio::test]
    async fn missing_workspace_file_fails_before_building() {
        let dir = TempDir::new().unwrap();
        let mut pm = MockPackageManager::new();
        pm.expect_build().never();

        let err = run(BuildJob {
            cwd: dir.path(),
            project_name: "shop",
            token: "t",
            projects_domain: "mdbgo.io",
            package_manager: &pm,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PublishError::Build(_)));
    }
}
