use crate::api::{PublishHeaders, PublishRequest, StrategyResult};
use crate::archive::{ArchiveEvent, ArchiveJob};
use crate::build::{BuildJob, run_build};
use crate::context::{EntityKind, PublishContext, PublishServices};
use crate::error::PublishError;
use crate::progress::format_megabytes;

/// Build locally, then stream the project directory to the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtpStrategy;

impl FtpStrategy {
    pub async fn publish(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<StrategyResult, PublishError> {
        if ctx.project_name.trim().is_empty() {
            return Err(PublishError::config(
                "Project name is empty. Set meta.name in .mdb or the name field in package.json.",
            ));
        }

        if ctx.kind() == EntityKind::Frontend {
            self.build(ctx, services).await?;
        }
        self.upload(ctx, services).await
    }

    async fn build(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<(), PublishError> {
        let status = services.progress.stage("Building project...");
        let report = run_build(BuildJob {
            cwd: ctx.cwd(),
            project_name: &ctx.project_name,
            token: &ctx.token,
            projects_domain: &services.config.projects_domain,
            package_manager: services.package_manager.as_ref(),
        })
        .await;
        status.finish();

        if let Some(report) = report? {
            tracing::debug!(recipe = %report.recipe, "Build step complete");
            for warning in &report.warnings {
                services.prompter.notice(warning);
            }
        }
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<StrategyResult, PublishError> {
        let status = services.progress.stage("Uploading files (0.000 MB)");
        let handle = status.handle();

        let (body, producer) = ArchiveJob::new(ctx.cwd()).spawn(move |event| match event {
            ArchiveEvent::Progress { processed_bytes } => {
                handle.set(format!(
                    "Uploading files ({} MB)",
                    format_megabytes(processed_bytes)
                ));
            }
            ArchiveEvent::Warning(message) => {
                tracing::debug!(%message, "Archive warning");
                handle.println(format!("Warning: {}", message));
            }
        });

        let request = PublishRequest {
            headers: PublishHeaders::from_context(ctx),
            body,
        };
        let result = services.api.publish(request).await;
        status.finish();

        // The response decides success; the producer outcome is informational.
        match producer.await {
            Ok(Ok(summary)) => {
                tracing::debug!(files = summary.files, bytes = summary.processed_bytes, "Archive sent");
            }
            Ok(Err(err)) => tracing::debug!(error = %format!("{err:#}"), "Archive producer stopped"),
            Err(err) => tracing::debug!(error = %err, "Archive producer task failed"),
        }

        result
    }
}
