use std::path::Path;

use crate::config::Paths;
use crate::error::DeployResult;
use crate::logfile::LogFile;
use crate::script::Fragment;
use crate::source::{GitRemote, SourceProvider};
use crate::target::{DeploymentTarget, GitRepository, SourceType};

/// Any git remote given by URL. SSH remotes authenticate with the
/// repository's `ssh_key`; HTTPS remotes may carry a token.
#[derive(Debug, Clone)]
pub struct CustomGit {
    repo: GitRepository,
}

impl CustomGit {
    #[must_use]
    pub const fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    /// Tokens only apply to HTTPS remotes.
    #[must_use]
    pub fn remote(&self) -> GitRemote {
        let credentials = match &self.repo.token {
            Some(token) if self.repo.repository.starts_with("https://") => {
                let user = self.repo.username.as_deref().unwrap_or("git");
                Some((user.to_string(), token.clone()))
            }
            _ => None,
        };
        GitRemote {
            url: self.repo.repository.clone(),
            branch: self.repo.branch.clone(),
            credentials,
            ssh_key: self.repo.ssh_key.clone(),
        }
    }
}

impl SourceProvider for CustomGit {
    fn source_type(&self) -> SourceType {
        SourceType::Git
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
