use anyhow::Context;

use super::{BuildJob, BuildReport, DIST_DIR, Recipe, build_error, run_package_build};
use crate::error::PublishError;

const VUE_CONFIG: &str = "vue.config.js";

/// Build configs that already control the asset path.
const KNOWN_CONFIGS: [&str; 4] = [VUE_CONFIG, "vite.config.js", "vite.config.ts", "vite.config.mjs"];

const RELATIVE_PUBLIC_PATH: &str = "module.exports = {\n  publicPath: './'\n};\n";

pub(super) async fn run(job: BuildJob<'_>) -> Result<BuildReport, PublishError> {
    let mut warnings = Vec::new();
    if KNOWN_CONFIGS.iter().any(|name| job.cwd.join(name).exists()) {
        warnings.push(
            "Using the existing build config; assets must use a relative public path (./)"
                .to_string(),
        );
    } else {
        let path = job.cwd.join(VUE_CONFIG);
        std::fs::write(&path, RELATIVE_PUBLIC_PATH)
            .with_context(|| format!("Failed to write {}", path.display()))
            .map_err(build_error)?;
        tracing::debug!(file = %path.display(), "Created Vue config with relative publicPath");
    }

    run_package_build(&job).await?;

    Ok(BuildReport {
        recipe: Recipe::Vue,
        output_dir: job.cwd.join(DIST_DIR),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::MockPackageManager;
    use tempfile::TempDir;

    fn job<'a>(dir: &'a TempDir, pm: &'a MockPackageManager) -> BuildJob<'a> {
        BuildJob {
            cwd: dir.path(),
            project_name: "site",
            token: "t",
            projects_domain: "mdbgo.io",
            package_manager: pm,
        }
    }

    #[tokio::test]
    async fn creates_config_when_missing() {
        let dir = TempDir::new().unwrap();
        let mut pm = MockPackageManager::new();
        pm.expect_build().times(1).returning(|cwd| {
            assert!(cwd.join(VUE_CONFIG).exists());
            Ok(())
        });

        let report = run(job(&dir, &pm)).await.unwrap();

        let config = std::fs::read_to_string(dir.path().join(VUE_CONFIG)).unwrap();
        assert!(config.contains("publicPath: './'"));
        assert_eq!(report.output_dir, dir.path().join("dist"));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(VUE_CONFIG), "module.exports = {};\n").unwrap();
        let mut pm = MockPackageManager::new();
        pm.expect_build().times(1).returning(|_| Ok(()));

        let report = run(job(&dir, &pm)).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(VUE_CONFIG)).unwrap(),
            "module.exports = {};\n"
        );
        assert_eq!(report.warnings.len(), 1);
    }
}
