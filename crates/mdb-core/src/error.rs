//! Error taxonomy for the publish subsystem.
//!
//! Strategies and collaborators reject upward with a [`PublishError`]; the
//! conflict-retry loop is the only place that decides whether an error is
//! recoverable.

use std::path::PathBuf;

/// Message emitted when the retry loop gives up.
pub const TOO_MANY_RETRIES: &str =
    "Too many retries. Please check the project name and domain in your .mdb file and try again.";

/// Errors produced while publishing a project.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// A build recipe failed; the attempt is aborted immediately.
    #[error("Build failed: {0}")]
    Build(String),

    /// The upload could not be delivered (network, archive stream, bad response body).
    #[error("Upload failed: {0}")]
    Transport(String),

    /// The remote API answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A pipeline step failed. `hint` carries remediation text when known.
    #[error("{message}")]
    PipelineStep {
        message: String,
        hint: Option<String>,
    },

    /// Circuit breaker: the attempt cap was exceeded.
    #[error("{}", TOO_MANY_RETRIES)]
    TooManyRetries,

    /// Another publish holds the lock for this directory.
    #[error("Another publish is already running for {project_root}. Remove {lock_file} if it is stale.")]
    Locked {
        project_root: PathBuf,
        lock_file: PathBuf,
    },

    /// Missing or invalid local configuration (token, project name, descriptor).
    #[error("{0}")]
    Config(String),

    /// The user declined a step that publishing depends on.
    #[error("Publish aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PublishError {
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn step(message: impl Into<String>) -> Self {
        Self::PipelineStep {
            message: message.into(),
            hint: None,
        }
    }

    pub fn step_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::PipelineStep {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Remediation text attached to the error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::PipelineStep { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of an API rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(err.into())
    }
}
