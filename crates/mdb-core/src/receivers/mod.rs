//! Entity receivers.
//!
//! A receiver turns a project directory into a [`PublishContext`] for its
//! entity kind (frontend, backend or WordPress) and hands it to the shared
//! conflict-retry loop in [`retry`].

mod backend;
mod frontend;
pub mod retry;
mod wordpress;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::{
    KEY_DOMAIN, KEY_NAME, KEY_PUBLISH_METHOD, KEY_STARTER, KEY_TYPE, PackageJson,
    ProjectDescriptor,
};
use crate::context::{EntityKind, EntityState, PublishContext, PublishFlags, PublishServices};
use crate::error::PublishError;
use crate::lock::PublishLock;
use crate::prompt::{Prompter, text_until_valid};

pub use backend::{BACKEND_PLATFORMS, BackendReceiver};
pub use frontend::FrontendReceiver;
pub use retry::{
    Conflict, MAX_PUBLISH_ATTEMPTS, PublishAttempt, PublishReport, Resolution, validate_domain,
    validate_project_name,
};
pub use wordpress::{WORDPRESS_PAGES, WordpressReceiver};

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInvocation {
    pub cwd: PathBuf,
    pub token: String,
    pub flags: PublishFlags,
}

#[async_trait]
pub trait Receiver: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Collect everything the first attempt needs, prompting for gaps.
    async fn prepare(
        &self,
        invocation: &PublishInvocation,
        services: &PublishServices,
    ) -> Result<PublishContext, PublishError>;

    /// Note shown after the very first publish of a project.
    fn first_publish_note(&self, report: &PublishReport) -> String;
}

pub fn receiver_for(kind: EntityKind) -> Box<dyn Receiver> {
    match kind {
        EntityKind::Frontend => Box::new(FrontendReceiver),
        EntityKind::Backend => Box::new(BackendReceiver),
        EntityKind::Wordpress => Box::new(WordpressReceiver),
    }
}

/// Entity kind from the command line, else `meta.type`, else frontend.
pub fn resolve_kind(
    explicit: Option<EntityKind>,
    project_root: &Path,
) -> Result<EntityKind, PublishError> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    let descriptor = ProjectDescriptor::load(project_root)?;
    match descriptor.get_str(KEY_TYPE) {
        Some(value) => Ok(value.parse()?),
        None => Ok(EntityKind::Frontend),
    }
}

/// Publish the project at `invocation.cwd` as `kind`.
pub async fn publish(
    kind: EntityKind,
    invocation: &PublishInvocation,
    services: &PublishServices,
) -> Result<PublishReport, PublishError> {
    let _lock = PublishLock::acquire(&services.lock_dir, &invocation.cwd)?;
    let receiver = receiver_for(kind);
    tracing::debug!(kind = %receiver.kind(), cwd = %invocation.cwd.display(), "Preparing publish");

    let ctx = receiver.prepare(invocation, services).await?;
    let mut report = retry::run(ctx, services).await?;
    if report.result.is_first_publish() {
        let note = receiver.first_publish_note(&report);
        report.notes.insert(0, note);
    }

    remember_kind(&invocation.cwd, kind)?;
    Ok(report)
}

fn remember_kind(project_root: &Path, kind: EntityKind) -> Result<(), PublishError> {
    let mut descriptor = ProjectDescriptor::load(project_root)?;
    if descriptor.get_str(KEY_TYPE).is_none() {
        descriptor.set_value(KEY_TYPE, kind.as_str());
        descriptor.save()?;
    }
    Ok(())
}

/// Context fields every entity reads from `.mdb`.
fn base_context(
    invocation: &PublishInvocation,
    project_name: String,
    entity: EntityState,
    descriptor: &ProjectDescriptor,
) -> PublishContext {
    let preference = descriptor
        .get_str(KEY_PUBLISH_METHOD)
        .and_then(|value| match value.parse() {
            Ok(method) => Some(method),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring publishMethod from .mdb");
                None
            }
        });

    PublishContext::new(&invocation.cwd, project_name, entity, &invocation.token)
        .with_package_name(descriptor.get_str(KEY_STARTER))
        .with_domain(descriptor.get_str(KEY_DOMAIN))
        .with_delivery_preference(preference)
        .with_flags(invocation.flags)
}

/// Project name from `.mdb`, then `package.json`, then the user.
///
/// The resolved name is written back to `.mdb`.
fn resolve_project_name(
    project_root: &Path,
    descriptor: &mut ProjectDescriptor,
    prompter: &dyn Prompter,
) -> Result<String, PublishError> {
    if let Some(name) = descriptor.get_str(KEY_NAME) {
        return Ok(name);
    }

    let package_name = PackageJson::load(project_root)?
        .and_then(|package| package.name().map(str::to_string));
    let name = match package_name {
        Some(name) if validate_project_name(&name, None).is_ok() => name,
        other => {
            let initial = other.or_else(|| {
                project_root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            });
            text_until_valid(prompter, "Enter the project name", initial, |value| {
                validate_project_name(value, None)
            })?
        }
    };

    descriptor.set_value(KEY_NAME, name.as_str());
    descriptor.save()?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StrategyResult;
    use crate::context::DeliveryMethod;
    use crate::prompt::MockPrompter;
    use crate::testing::Mocks;
    use tempfile::TempDir;

    fn invocation(dir: &TempDir) -> PublishInvocation {
        PublishInvocation {
            cwd: dir.path().to_path_buf(),
            token: "token".to_string(),
            flags: PublishFlags::default(),
        }
    }

    #[test]
    fn kind_falls_back_to_descriptor_then_frontend() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_kind(None, dir.path()).unwrap(), EntityKind::Frontend);

        std::fs::write(dir.path().join(".mdb"), r#"{"meta": {"type": "backend"}}"#).unwrap();
        assert_eq!(resolve_kind(None, dir.path()).unwrap(), EntityKind::Backend);
        assert_eq!(
            resolve_kind(Some(EntityKind::Wordpress), dir.path()).unwrap(),
            EntityKind::Wordpress
        );
    }

    #[test]
    fn name_prefers_descriptor_over_package_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".mdb"), r#"{"meta": {"name": "from-mdb"}}"#).unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "from-pkg"}"#).unwrap();
        let mut descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        let prompter = MockPrompter::new();

        let name = resolve_project_name(dir.path(), &mut descriptor, &prompter).unwrap();
        assert_eq!(name, "from-mdb");
    }

    #[test]
    fn invalid_package_name_is_offered_for_editing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "@acme/site"}"#).unwrap();
        let mut descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        let mut prompter = MockPrompter::new();
        prompter
            .expect_text()
            .withf(|_, initial| initial.as_deref() == Some("@acme/site"))
            .times(1)
            .returning(|_, _| Ok("acme-site".to_string()));

        let name = resolve_project_name(dir.path(), &mut descriptor, &prompter).unwrap();

        assert_eq!(name, "acme-site");
        let saved = ProjectDescriptor::load(dir.path()).unwrap();
        assert_eq!(saved.get_str(KEY_NAME).as_deref(), Some("acme-site"));
    }

    #[test]
    fn base_context_reads_descriptor_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".mdb"),
            r#"{"meta": {"starter": "react-starter", "domain": "shop.example.com"}, "publishMethod": "pipeline"}"#,
        )
        .unwrap();
        let descriptor = ProjectDescriptor::load(dir.path()).unwrap();

        let ctx = base_context(
            &invocation(&dir),
            "shop".to_string(),
            EntityState::Frontend,
            &descriptor,
        );

        assert_eq!(ctx.package_name.as_deref(), Some("react-starter"));
        assert_eq!(ctx.domain.as_deref(), Some("shop.example.com"));
        assert_eq!(ctx.delivery_preference, Some(DeliveryMethod::Pipeline));
    }

    #[tokio::test]
    async fn concurrent_publish_in_same_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mocks = Mocks::default();
        let services = mocks.build();
        let _held = PublishLock::acquire(&services.lock_dir, dir.path()).unwrap();

        let err = publish(EntityKind::Backend, &invocation(&dir), &services)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Locked { .. }));
    }

    #[tokio::test]
    async fn first_publish_adds_note_and_records_type() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".mdb"),
            r#"{"meta": {"name": "api"}, "backend": {"platform": "node18"}, "publishMethod": "ftp"}"#,
        )
        .unwrap();
        let mut mocks = Mocks::default();
        mocks.api.expect_publish().times(1).returning(|_| {
            Ok(StrategyResult {
                status_code: 201,
                message: "Created".to_string(),
                url: Some("https://api.mdbgo.io".to_string()),
            })
        });

        let report = publish(EntityKind::Backend, &invocation(&dir), &mocks.build())
            .await
            .unwrap();

        assert_eq!(report.notes.len(), 1);
        let descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        assert_eq!(descriptor.get_str(KEY_TYPE).as_deref(), Some("backend"));
    }
}
