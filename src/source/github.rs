use std::path::Path;

use crate::config::Paths;
use crate::error::DeployResult;
use crate::logfile::LogFile;
use crate::script::Fragment;
use crate::source::{GitRemote, SourceProvider};
use crate::target::{DeploymentTarget, GitRepository, SourceType};

const DEFAULT_HOST: &str = "github.com";

/// GitHub repositories, authenticated with an installation or
/// personal access token.
#[derive(Debug, Clone)]
pub struct Github {
    repo: GitRepository,
}

impl Github {
    #[must_use]
    pub const fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    #[must_use]
    pub fn remote(&self) -> GitRemote {
        let host = self.repo.host.as_deref().unwrap_or(DEFAULT_HOST);
        let credentials = self
            .repo
            .token
            .as_deref()
            .map(|token| ("x-access-token", token));
        GitRemote::https(host, &self.repo, credentials)
    }
}

impl SourceProvider for Github {
    fn source_type(&self) -> SourceType {
        SourceType::Github
    }

    fn clone_source(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log: &mut LogFile,
    ) -> DeployResult<()> {
        self.remote()
            .clone_local(&paths.code_dir(&target.app_name), log)
    }

    fn clone_command(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log_path: &Path,
    ) -> DeployResult<Fragment> {
        Ok(self
            .remote()
            .clone_fragment(&paths.code_dir(&target.app_name), log_path))
    }
}
