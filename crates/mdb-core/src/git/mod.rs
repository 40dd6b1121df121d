//! Version control operations needed for pipeline publishing.
//!
//! This module provides:
//! - The [`VersionControl`] seam the pipeline strategy talks to
//! - A git implementation (git2 for local reads, the git CLI for anything
//!   that touches the network or the working tree)
//! - Remote URL helpers

mod cli;
mod remote;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub use cli::GitCli;
pub use remote::{points_at_host, remote_host};

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn current_branch(&self) -> anyhow::Result<String>;

    /// Paths with uncommitted changes (including untracked files).
    async fn status(&self) -> anyhow::Result<Vec<String>>;

    async fn checkout(&self, branch: &str) -> anyhow::Result<()>;

    async fn pull(&self, branch: &str) -> anyhow::Result<()>;

    /// Merge `branch` into the current branch.
    async fn merge(&self, branch: &str) -> anyhow::Result<()>;

    async fn push(&self, refspec: &str) -> anyhow::Result<()>;

    async fn current_remote_url(&self) -> anyhow::Result<String>;

    /// Stage `paths` and commit them with `message`.
    async fn commit(&self, paths: &[String], message: &str) -> anyhow::Result<()>;
}
