//! Delivery strategies.
//!
//! A publish attempt runs exactly one strategy: [`FtpStrategy`] builds and
//! uploads an archive, [`PipelineStrategy`] pushes to the branch the
//! platform's CI watches.

mod ci;
mod ftp;
mod pipeline;

use crate::api::StrategyResult;
use crate::context::{DeliveryMethod, PublishContext, PublishServices};
use crate::error::PublishError;
use crate::git::points_at_host;

pub use ci::{CI_FILE, ci_template};
pub use ftp::FtpStrategy;
pub use pipeline::PipelineStrategy;

/// The active delivery mechanism for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    Ftp(FtpStrategy),
    Pipeline(PipelineStrategy),
}

impl DeliveryStrategy {
    pub fn method(&self) -> DeliveryMethod {
        match self {
            Self::Ftp(_) => DeliveryMethod::Ftp,
            Self::Pipeline(_) => DeliveryMethod::Pipeline,
        }
    }

    pub async fn publish(
        &self,
        ctx: &PublishContext,
        services: &PublishServices,
    ) -> Result<StrategyResult, PublishError> {
        match self {
            Self::Ftp(strategy) => strategy.publish(ctx, services).await,
            Self::Pipeline(strategy) => strategy.publish(ctx, services).await,
        }
    }
}

impl From<DeliveryMethod> for DeliveryStrategy {
    fn from(method: DeliveryMethod) -> Self {
        match method {
            DeliveryMethod::Ftp => Self::Ftp(FtpStrategy),
            DeliveryMethod::Pipeline => Self::Pipeline(PipelineStrategy),
        }
    }
}

/// Pick the delivery method for a context.
///
/// An explicit flag wins, then the persisted preference. Projects whose git
/// remote already lives on the platform's git host are asked; everything
/// else defaults to FTP.
pub async fn select_method(
    ctx: &PublishContext,
    services: &PublishServices,
) -> Result<DeliveryMethod, PublishError> {
    if let Some(method) = ctx.flags.method {
        return Ok(method);
    }
    if let Some(method) = ctx.delivery_preference {
        return Ok(method);
    }

    let remote = match services.vcs.current_remote_url().await {
        Ok(remote) => remote,
        Err(err) => {
            tracing::debug!(error = %err, "No usable git remote; defaulting to FTP");
            return Ok(DeliveryMethod::Ftp);
        }
    };
    if !points_at_host(&remote, &services.config.git_host) {
        return Ok(DeliveryMethod::Ftp);
    }

    let items = vec![
        "FTP (build locally and upload files)".to_string(),
        "Pipeline (push to the CI branch)".to_string(),
    ];
    let choice = services
        .prompter
        .select("How would you like to publish this project?", &items, 0)?;
    Ok(if choice == 1 {
        DeliveryMethod::Pipeline
    } else {
        DeliveryMethod::Ftp
    })
}
