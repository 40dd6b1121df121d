//! Mocked collaborators for unit tests.

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::MockPublishApi;
use crate::config::CliConfig;
use crate::context::PublishServices;
use crate::git::MockVersionControl;
use crate::package_manager::MockPackageManager;
use crate::progress::Progress;
use crate::prompt::MockPrompter;

/// Mocks to configure before freezing them into [`PublishServices`].
pub(crate) struct Mocks {
    pub config: CliConfig,
    pub api: MockPublishApi,
    pub vcs: MockVersionControl,
    pub package_manager: MockPackageManager,
    pub prompter: MockPrompter,
    pub lock_dir: PathBuf,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            config: CliConfig::default(),
            api: MockPublishApi::new(),
            vcs: MockVersionControl::new(),
            package_manager: MockPackageManager::new(),
            prompter: MockPrompter::new(),
            lock_dir: std::env::temp_dir().join(format!("mdb-test-locks-{}", std::process::id())),
        }
    }
}

impl Mocks {
    /// Accept any notice without asserting on it.
    pub fn quiet(mut self) -> Self {
        self.prompter.expect_notice().return_const(());
        self
    }

    pub fn build(self) -> PublishServices {
        PublishServices {
            config: self.config,
            api: Arc::new(self.api),
            vcs: Arc::new(self.vcs),
            package_manager: Arc::new(self.package_manager),
            prompter: Arc::new(self.prompter),
            progress: Progress::hidden(),
            lock_dir: self.lock_dir,
        }
    }
}
