use std::path::Path;

use crate::config::Paths;
use crate::error::DeployResult;
use crate::logfile::LogFile;
use crate::script::Fragment;
use crate::source::{GitRemote, SourceProvider};
use crate::target::{DeploymentTarget, GitRepository, SourceType};

const DEFAULT_HOST: &str = "gitlab.com";

/// GitLab projects (gitlab.com or self-hosted), authenticated with
/// an OAuth or project access token.
#[derive(Debug, Clone)]
pub struct Gitlab {
    repo: GitRepository,
}

impl Gitlab {
    #[must_use]
    pub const fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    #[must_use]
    pub fn remote(&self) -> GitRemote {
        let host = self.repo.host.as_deref().unwrap_or(DEFAULT_HOST);
        let credentials = self.repo.token.as_deref().map(|token| ("oauth2", token));
        GitRemote::https(host, &self.repo, credentials)
    }
}

impl SourceProvider for Gitlab {
    fn source_type(&self) -> SourceType {
        SourceType::Gitlab
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
