//! Git implementation of [`VersionControl`].

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use git2::{BranchType, ErrorCode, Repository, StatusOptions};
use tokio::process::Command;

use super::VersionControl;

/// Variables that would redirect git away from the project directory.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

const REMOTE: &str = "origin";

/// Runs git against one working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    cwd: PathBuf,
}

impl GitCli {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn open(&self) -> anyhow::Result<Repository> {
        Repository::discover(&self.cwd)
            .with_context(|| format!("Not a git repository: {}", self.cwd.display()))
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd.current_dir(&self.cwd);
        cmd
    }

    async fn run_git(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self
            .git_command()
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run git {:?}", args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git command failed {:?}: {}", args, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        let repo = self.open()?;
        let local = repo.find_branch(branch, BranchType::Local).is_ok();
        let remote = repo
            .find_branch(&format!("{}/{}", REMOTE, branch), BranchType::Remote)
            .is_ok();
        Ok(local || remote)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn current_branch(&self) -> anyhow::Result<String> {
        let repo = self.open()?;
        let branch = match repo.head() {
            Ok(head) => head
                .shorthand()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("HEAD is not a valid UTF-8 reference"))?,
            // Fresh repository without commits: HEAD still names a branch.
            Err(err) if err.code() == ErrorCode::UnbornBranch => {
                let head = repo.find_reference("HEAD")?;
                head.symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("HEAD does not point at a branch"))?
            }
            Err(err) => return Err(err).context("Failed to read HEAD"),
        };
        if branch == "HEAD" {
            anyhow::bail!("HEAD is detached; check out a branch before publishing");
        }
        Ok(branch)
    }

    async fn status(&self) -> anyhow::Result<Vec<String>> {
        let repo = self.open()?;
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = repo
            .statuses(Some(&mut options))
            .context("Failed to read repository status")?;

        Ok(statuses
            .iter()
            .filter(|entry| !entry.status().is_ignored())
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect())
    }

    async fn checkout(&self, branch: &str) -> anyhow::Result<()> {
        if self.branch_exists(branch)? {
            self.run_git(&["checkout", branch]).await?;
        } else {
            self.run_git(&["checkout", "-b", branch]).await?;
        }
        Ok(())
    }

    async fn pull(&self, branch: &str) -> anyhow::Result<()> {
        match self.run_git(&["pull", "--no-rebase", REMOTE, branch]).await {
            Ok(_) => Ok(()),
            // A branch that was never pushed has nothing to pull yet.
            Err(err) if err.to_string().contains("couldn't find remote ref") => {
                tracing::debug!(branch, "Remote branch does not exist yet; skipping pull");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn merge(&self, branch: &str) -> anyhow::Result<()> {
        self.run_git(&["merge", "--no-edit", branch]).await?;
        Ok(())
    }

    async fn push(&self, refspec: &str) -> anyhow::Result<()> {
        self.run_git(&["push", "-u", REMOTE, refspec]).await?;
        Ok(())
    }

    async fn current_remote_url(&self) -> anyhow::Result<String> {
        let repo = self.open()?;
        let remote = repo
            .find_remote(REMOTE)
            .with_context(|| format!("Remote '{}' is not configured", REMOTE))?;
        remote
            .url()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Remote '{}' URL is not valid UTF-8", REMOTE))
    }

    async fn commit(&self, paths: &[String], message: &str) -> anyhow::Result<()> {
        let mut add = vec!["add", "--"];
        add.extend(paths.iter().map(String::as_str));
        self.run_git(&add).await?;
        self.run_git(&["commit", "-m", message]).await?;
        Ok(())
    }
}
