use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{
    BuildJob, BuildReport, Recipe, RestoreGuard, build_error, relocate_to_dist, run_package_build,
};
use crate::auth::username_from_token;
use crate::config::PackageJson;
use crate::error::PublishError;

const OUTPUT_DIR: &str = "build";

/// Routing entries checked in order.
const ROUTING_ENTRIES: [&str; 6] = [
    "src/App.js",
    "src/App.jsx",
    "src/App.tsx",
    "src/index.js",
    "src/index.jsx",
    "src/index.tsx",
];

const ROUTER_TAGS: [&str; 2] = ["<BrowserRouter>", "<Router>"];

pub(super) async fn run(job: BuildJob<'_>) -> Result<BuildReport, PublishError> {
    let username = username_from_token(job.token).map_err(build_error)?;
    let base_path = format!("/{}/{}/dist", username, job.project_name);
    let homepage = format!("https://{}{}/", job.projects_domain, base_path);

    let mut guard = RestoreGuard::new();
    let built = build_with_base(&job, &mut guard, &base_path, &homepage).await;
    let restored = guard.restore();

    built?;
    restored.map_err(build_error)?;

    let output = job.cwd.join(OUTPUT_DIR);
    if !output.is_dir() {
        return Err(PublishError::build(format!(
            "React build finished but {} was not created",
            output.display()
        )));
    }
    let dist = relocate_to_dist(job.cwd, &output).map_err(build_error)?;

    Ok(BuildReport {
        recipe: Recipe::React,
        output_dir: dist,
        warnings: Vec::new(),
    })
}

async fn build_with_base(
    job: &BuildJob<'_>,
    guard: &mut RestoreGuard,
    base_path: &str,
    homepage: &str,
) -> Result<(), PublishError> {
    match inject_basename(job.cwd, guard, base_path).map_err(build_error)? {
        Some(entry) => tracing::debug!(file = %entry.display(), base_path, "Injected router basename"),
        None => tracing::debug!("No router root found; building without basename"),
    }

    let mut package = PackageJson::load(job.cwd)
        .map_err(build_error)?
        .ok_or_else(|| PublishError::build("package.json disappeared before the build"))?;
    guard.track(package.path()).map_err(build_error)?;
    package.set_field("homepage", homepage);
    package.save().map_err(build_error)?;

    run_package_build(job).await
}

/// Add `basename` to the first router root found. Returns the edited file.
fn inject_basename(
    cwd: &Path,
    guard: &mut RestoreGuard,
    base_path: &str,
) -> anyhow::Result<Option<PathBuf>> {
    for entry in ROUTING_ENTRIES {
        let path = cwd.join(entry);
        if !path.is_file() {
            continue;
        }
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let Some(tag) = ROUTER_TAGS.iter().copied().find(|tag| source.contains(tag)) else {
            continue;
        };

        let element = &tag[1..tag.len() - 1];
        let replacement = format!(r#"<{} basename="{}">"#, element, base_path);
        guard.track(&path)?;
        std::fs::write(&path, source.replacen(tag, &replacement, 1))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(Some(path));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::MockPackageManager;
    use tempfile::TempDir;

    // payload: {"name":"jdoe"}
    const TOKEN: &str = "header.eyJuYW1lIjoiamRvZSJ9.signature";

    const APP: &str = "export default () => <BrowserRouter><Routes /></BrowserRouter>;\n";

    fn react_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "shop", "dependencies": {"react": "17.0.0"}, "scripts": {"build": "x"}}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/App.js"), APP).unwrap();
        dir
    }

    #[tokio::test]
    async fn builds_into_dist_and_reverts_sources() {
        let dir = react_project();
        let original_manifest = std::fs::read(dir.path().join("package.json")).unwrap();

        let mut pm = MockPackageManager::new();
        pm.expect_build().times(1).returning(|cwd| {
            let manifest = std::fs::read_to_string(cwd.join("package.json"))?;
            assert!(manifest.contains("https://mdbgo.io/jdoe/shop/dist/"));
            let app = std::fs::read_to_string(cwd.join("src/App.js"))?;
            assert!(app.contains(r#"<BrowserRouter basename="/jdoe/shop/dist">"#));

            std::fs::create_dir_all(cwd.join("build"))?;
            std::fs::write(cwd.join("build/index.html"), "<html>")?;
            Ok(())
        });

        let report = run(BuildJob {
            cwd: dir.path(),
            project_name: "shop",
            token: TOKEN,
            projects_domain: "mdbgo.io",
            package_manager: &pm,
        })
        .await
        .unwrap();

        assert_eq!(report.recipe, Recipe::React);
        assert!(dir.path().join("dist/index.html").exists());
        assert!(!dir.path().join("build").exists());

        let manifest = PackageJson::load(dir.path()).unwrap().unwrap();
        assert!(manifest.field("homepage").is_none());
        assert_eq!(
            std::fs::read(dir.path().join("package.json")).unwrap(),
            original_manifest
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/App.js")).unwrap(),
            APP
        );
    }

    #[tokio::test]
    async fn failed_build_still_reverts_sources() {
        let dir = react_project();

        let mut pm = MockPackageManager::new();
        pm.expect_build()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("npm run build failed: syntax error")));

        let err = run(BuildJob {
            cwd: dir.path(),
            project_name: "shop",
            token: TOKEN,
            projects_domain: "mdbgo.io",
            package_manager: &pm,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PublishError::Build(ref msg) if msg.contains("syntax error")));
        let manifest = PackageJson::load(dir.path()).unwrap().unwrap();
        assert!(manifest.field("homepage").is_none());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/App.js")).unwrap(),
            APP
        );
    }

    #[tokio::test]
    async fn malformed_token_fails_before_touching_files() {
        let dir = react_project();
        let mut pm = MockPackageManager::new();
        pm.expect_build().never();

        let err = run(BuildJob {
            cwd: dir.path(),
            project_name: "shop",
            token: "not-a-jwt",
            projects_domain: "mdbgo.io",
            package_manager: &pm,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PublishError::Build(_)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/App.js")).unwrap(),
            APP
        );
    }

    #[test]
    fn falls_back_to_index_entry_and_plain_router() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/App.tsx"), "export const App = () => null;").unwrap();
        std::fs::write(
            dir.path().join("src/index.tsx"),
            "render(<Router><App /></Router>);",
        )
        .unwrap();

        let mut guard = RestoreGuard::new();
        let edited = inject_basename(dir.path(), &mut guard, "/u/p/dist").unwrap();

        assert_eq!(edited, Some(dir.path().join("src/index.tsx")));
        let source = std::fs::read_to_string(dir.path().join("src/index.tsx")).unwrap();
        assert_eq!(source, r#"render(<Router basename="/u/p/dist"><App /></Router>);"#);
        guard.restore().unwrap();
    }
}
