use std::path::Path;

use async_trait::async_trait;

use super::{PublishInvocation, PublishReport, Receiver, base_context, resolve_project_name};
use crate::config::{MANIFEST_FILE, ProjectDescriptor};
use crate::context::{EntityKind, EntityState, PublishContext, PublishServices};
use crate::error::PublishError;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrontendReceiver;

impl FrontendReceiver {
    /// Offer to create `package.json`; a static site may go without one.
    async fn ensure_manifest(
        &self,
        project_root: &Path,
        services: &PublishServices,
    ) -> Result<(), PublishError> {
        if project_root.join(MANIFEST_FILE).exists() {
            return Ok(());
        }
        let package_manager = services.package_manager.as_ref();
        let create = services.prompter.confirm(
            &format!(
                "Missing {}. Create one with `{} init`?",
                MANIFEST_FILE,
                package_manager.name()
            ),
            true,
        )?;
        if create {
            package_manager
                .init(project_root)
                .await
                .map_err(|e| PublishError::config(format!("Failed to create {}: {e:#}", MANIFEST_FILE)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Receiver for FrontendReceiver {
    fn kind(&self) -> EntityKind {
        EntityKind::Frontend
    }

    async fn prepare(
        &self,
        invocation: &PublishInvocation,
        services: &PublishServices,
    ) -> Result<PublishContext, PublishError> {
        let cwd = invocation.cwd.as_path();
        self.ensure_manifest(cwd, services).await?;

        let mut descriptor = ProjectDescriptor::load(cwd)?;
        let name = resolve_project_name(cwd, &mut descriptor, services.prompter.as_ref())?;

        if invocation.flags.test {
            let status = services.progress.stage("Running tests...");
            let tested = services.package_manager.test(cwd).await;
            status.finish();
            tested.map_err(|e| PublishError::Aborted(format!("tests failed: {e:#}")))?;
        }

        Ok(base_context(
            invocation,
            name,
            EntityState::Frontend,
            &descriptor,
        ))
    }

    fn first_publish_note(&self, report: &PublishReport) -> String {
        match &report.result.url {
            Some(url) => format!(
                "Project '{}' was created and will be available at {} in a few moments.",
                report.context.project_name, url
            ),
            None => format!("Project '{}' was created.", report.context.project_name),
        }
    }
}
