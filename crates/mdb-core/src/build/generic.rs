use super::{BuildJob, BuildReport, DIST_DIR, Recipe, run_package_build};
use crate::error::PublishError;

const OUTPUT_DIRS: [&str; 2] = [DIST_DIR, "build"];

pub(super) async fn run(job: BuildJob<'_>) -> Result<BuildReport, PublishError> {
    run_package_build(&job).await?;

    let output = OUTPUT_DIRS
        .iter()
        .map(|name| job.cwd.join(name))
        .find(|path| path.is_dir())
        .ok_or_else(|| {
            PublishError::build(format!(
                "The build script finished but produced neither dist/ nor build/ in {}",
                job.cwd.display()
            ))
        })?;

    Ok(BuildReport {
        recipe: Recipe::Generic,
        warnings: vec![format!(
            "No supported framework detected; uploading {} as built by your build script. \
             The result may not be compatible with the hosting environment.",
            output.display()
        )],
        output_dir: output,
    })
}
