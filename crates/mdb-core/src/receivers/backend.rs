use async_trait::async_trait;

use super::{PublishInvocation, PublishReport, Receiver, base_context, resolve_project_name};
use crate::config::{KEY_BACKEND_PLATFORM, ProjectDescriptor};
use crate::context::{EntityKind, EntityState, PublishContext, PublishServices};
use crate::error::PublishError;

/// Technologies the platform can run.
pub const BACKEND_PLATFORMS: &[&str] = &[
    "node12", "node14", "node16", "node18", "php7.4", "php8.1", "python3.10", "java17", "go1.18",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendReceiver;

#[async_trait]
impl Receiver for BackendReceiver {
    fn kind(&self) -> EntityKind {
        EntityKind::Backend
    }

    async fn prepare(
        &self,
        invocation: &PublishInvocation,
        services: &PublishServices,
    ) -> Result<PublishContext, PublishError> {
        let prompter = services.prompter.as_ref();
        let mut descriptor = ProjectDescriptor::load(&invocation.cwd)?;
        let name = resolve_project_name(&invocation.cwd, &mut descriptor, prompter)?;

        let platform = match descriptor.get_str(KEY_BACKEND_PLATFORM) {
            Some(platform) => platform,
            None => {
                let items: Vec<String> = BACKEND_PLATFORMS.iter().map(|p| p.to_string()).collect();
                let choice = prompter.select("Choose a backend technology", &items, 0)?;
                let platform = items
                    .get(choice)
                    .cloned()
                    .ok_or_else(|| PublishError::config("No backend technology selected"))?;
                descriptor.set_value(KEY_BACKEND_PLATFORM, platform.as_str());
                descriptor.save()?;
                platform
            }
        };

        Ok(base_context(
            invocation,
            name,
            EntityState::Backend { platform },
            &descriptor,
        ))
    }

    fn first_publish_note(&self, report: &PublishReport) -> String {
        let project = &report.context.project_name;
        format!(
            "Backend '{}' was created. It may take a few minutes to start; check its logs with `mdb backend logs {}`.",
            project, project
        )
    }
}
