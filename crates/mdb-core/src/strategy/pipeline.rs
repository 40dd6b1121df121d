use anyhow::Context;

use super::ci::{CI_FILE, ci_template};
use crate::api::{PipelineSave, StrategyResult};
use crate::config::{KEY_PUBLISH_METHOD, ProjectDescriptor};
use crate::context::{DeliveryMethod, PublishContext, PublishServices};
use crate::error::PublishError;

/// Push to the public branch and let the platform's CI deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStrategy;

impl PipelineStrategy {
    pub async fn publish(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<StrategyResult, PublishError> {
        let vcs = services.vcs.as_ref();
        let public = services.config.public_branch.as_str();

        let current = vcs
            .current_branch()
            .await
            .map_err(|e| PublishError::step(format!("Failed to read the current branch: {e:#}")))?;

        self.ensure_ci_file(ctx, services, &current).await?;

        let dirty = vcs
            .status()
            .await
            .map_err(|e| PublishError::step(format!("Failed to read git status: {e:#}")))?;
        if !dirty.is_empty() {
            return Err(PublishError::step_with_hint(
                format!(
                    "You have uncommitted changes in {} file(s): {}",
                    dirty.len(),
                    dirty.join(", ")
                ),
                "Commit or stash your changes before publishing with the pipeline.",
            ));
        }

        if current != public {
            self.merge_into_public(services, &current).await?;
        }

        tracing::debug!(branch = public, "Pushing to public branch");
        let pushed = vcs.push(public).await;
        if current != public {
            if let Err(err) = vcs.checkout(&current).await {
                tracing::warn!(branch = %current, error = %err, "Failed to switch back to the original branch");
                services
                    .prompter
                    .notice(&format!("Could not switch back to '{}': {:#}", current, err));
            }
        }
        pushed.map_err(|e| push_error(e, &services.config.git_host))?;

        if ctx.delivery_preference.is_none() {
            self.offer_default(ctx, services)?;
        }

        let repo_url = vcs
            .current_remote_url()
            .await
            .map_err(|e| PublishError::step(format!("Failed to read the git remote: {e:#}")))?;
        services
            .api
            .save_pipeline(PipelineSave {
                token: ctx.token.clone(),
                project_name: ctx.project_name.clone(),
                repo_url,
                domain: ctx.domain.clone(),
            })
            .await
    }

    /// Create, commit and push the CI descriptor when the project has none.
    async fn ensure_ci_file(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
        branch: &str,
    ) -> Result<(), PublishError> {
        let path = ctx.cwd().join(CI_FILE);
        if path.exists() {
            return Ok(());
        }

        let content = ci_template(&ctx.entity, &services.config.public_branch);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        services
            .prompter
            .notice(&format!("Created {} for the {} pipeline.", CI_FILE, ctx.kind()));

        let message = format!("Add {}", CI_FILE);
        self.commit_and_push(services, &[CI_FILE.to_string()], &message, branch)
            .await
    }

    /// Commit the listed project files that have changes and push them on
    /// the current branch, so the next attempt starts from a clean tree.
    ///
    /// Returns whether anything was committed.
    pub async fn commit_settings(
        &self,
        services: &PublishServices,
        paths: &[&str],
        message: &str,
    ) -> Result<bool, PublishError> {
        let vcs = services.vcs.as_ref();
        let dirty = vcs
            .status()
            .await
            .map_err(|e| PublishError::step(format!("Failed to read git status: {e:#}")))?;
        let changed: Vec<String> = paths
            .iter()
            .filter(|path| {
                dirty
                    .iter()
                    .any(|entry| entry == *path || entry.ends_with(&format!("/{}", path)))
            })
            .map(|path| path.to_string())
            .collect();
        if changed.is_empty() {
            return Ok(false);
        }

        let branch = vcs
            .current_branch()
            .await
            .map_err(|e| PublishError::step(format!("Failed to read the current branch: {e:#}")))?;
        self.commit_and_push(services, &changed, message, &branch)
            .await?;
        Ok(true)
    }

    async fn commit_and_push(
        &self,
        services: &PublishServices,
        paths: &[String],
        message: &str,
        branch: &str,
    ) -> Result<(), PublishError> {
        let vcs = services.vcs.as_ref();
        tracing::debug!(?paths, branch, "Committing project files");
        vcs.commit(paths, message).await.map_err(|e| {
            PublishError::step(format!("Failed to commit {}: {e:#}", paths.join(", ")))
        })?;
        vcs.push(branch)
            .await
            .map_err(|e| push_error(e, &services.config.git_host))
    }

    async fn merge_into_public(
        &self,
        services: &PublishServices,
        current: &str,
    ) -> Result<(), PublishError> {
        let public = services.config.public_branch.as_str();
        let consent = services.prompter.confirm(
            &format!(
                "Publishing uses the '{}' branch. Check it out, pull it and merge '{}' into it?",
                public, current
            ),
            true,
        )?;
        if !consent {
            return Err(PublishError::Aborted(format!(
                "changes must be merged into '{}' to publish with the pipeline",
                public
            )));
        }

        let vcs = services.vcs.as_ref();
        vcs.checkout(public)
            .await
            .map_err(|e| PublishError::step(format!("Failed to check out '{}': {e:#}", public)))?;
        vcs.pull(public)
            .await
            .map_err(|e| PublishError::step(format!("Failed to pull '{}': {e:#}", public)))?;
        vcs.merge(current).await.map_err(|e| {
            PublishError::step_with_hint(
                format!("Failed to merge '{}' into '{}': {e:#}", current, public),
                "Resolve the conflicts and commit, or run `git merge --abort`, then publish again.",
            )
        })?;
        Ok(())
    }

    fn offer_default(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<(), PublishError> {
        // Accepted on an earlier attempt of this publish.
        let mut descriptor = ProjectDescriptor::load(ctx.cwd())?;
        if descriptor.get_str(KEY_PUBLISH_METHOD).is_some() {
            return Ok(());
        }

        let save = services
            .prompter
            .confirm("Use the pipeline as the default publish method for this project?", true)?;
        if save {
            descriptor.set_value(KEY_PUBLISH_METHOD, DeliveryMethod::Pipeline.as_str());
            descriptor.save()?;
        }
        Ok(())
    }
}

fn push_error(err: anyhow::Error, git_host: &str) -> PublishError {
    PublishError::step_with_hint(
        format!("Failed to push: {err:#}"),
        format!(
            "Check that you can push to {}: add an SSH key to your account or use a personal access token over HTTPS.",
            git_host
        ),
    )
}
