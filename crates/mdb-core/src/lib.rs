//! mdb Core Library
//!
//! Publish orchestration for projects hosted on the MDB Go platform:
//! framework-aware builds, streaming archive upload, pipeline delivery and
//! the conflict-retry loop shared by the frontend, backend and WordPress
//! receivers.

pub mod api;
pub mod archive;
pub mod auth;
pub mod browser;
pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod lock;
pub mod package_manager;
pub mod progress;
pub mod prompt;
pub mod receivers;
pub mod strategy;

#[cfg(test)]
mod testing;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{CliConfig, ConfigStore, ProjectDescriptor};

    // Context
    pub use crate::context::{
        DeliveryMethod, EntityKind, EntityState, PublishContext, PublishFlags, PublishServices,
    };

    // Errors
    pub use crate::error::PublishError;

    // Collaborators
    pub use crate::api::{HttpPublishApi, PublishApi, StrategyResult};
    pub use crate::git::{GitCli, VersionControl};
    pub use crate::package_manager::{NodePackageManager, PackageManager, PackageManagerKind};
    pub use crate::progress::Progress;
    pub use crate::prompt::Prompter;

    // Publishing
    pub use crate::receivers::{PublishInvocation, PublishReport, publish, resolve_kind};
    pub use crate::strategy::DeliveryStrategy;
}
