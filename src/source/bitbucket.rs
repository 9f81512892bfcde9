use std::path::Path;

use crate::config::Paths;
use crate::error::DeployResult;
use crate::logfile::LogFile;
use crate::script::Fragment;
use crate::source::{GitRemote, SourceProvider};
use crate::target::{DeploymentTarget, GitRepository, SourceType};

const DEFAULT_HOST: &str = "bitbucket.org";

/// Bitbucket repositories, authenticated with a username and app
/// password, or a repository access token alone.
#[derive(Debug, Clone)]
pub struct Bitbucket {
    repo: GitRepository,
}

impl Bitbucket {
    #[must_use]
    pub const fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    #[must_use]
    pub fn remote(&self) -> GitRemote {
        let host = self.repo.host.as_deref().unwrap_or(DEFAULT_HOST);
        let credentials = self.repo.token.as_deref().map(|token| {
            let user = self.repo.username.as_deref().unwrap_or("x-token-auth");
            (user, token)
        });
        GitRemote::https(host, &self.repo, credentials)
    }
}

impl SourceProvider for Bitbucket {
    fn source_type(&self) -> SourceType {
        SourceType::Bitbucket
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_password_uses_username() {
        let bitbucket = Bitbucket::new(
            GitRepository::new("team/app")
                .username("jo")
                .token("app-pass"),
        );
        let remote = bitbucket.remote();
        assert_eq!(remote.url, "https://bitbucket.org/team/app.git");
        assert_eq!(
            remote.credentials,
            Some(("jo".to_string(), "app-pass".to_string()))
        );
    }

    #[test]
    fn access_token_without_username() {
        let bitbucket = Bitbucket::new(GitRepository::new("team/app").token("tok"));
        assert_eq!(
            bitbucket.remote().credentials,
            Some(("x-token-auth".to_string(), "tok".to_string()))
        );
    }
}
