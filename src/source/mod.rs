//! Source provider adapters: fetch a target's compose source tree,
//! either directly on this host or as a script fragment for a
//! remote one.

pub mod bitbucket;
pub mod custom_git;
pub mod github;
pub mod gitlab;
pub mod raw;

use std::path::Path;

use tracing::{debug, info};

use crate::cmd;
use crate::config::Paths;
use crate::error::{DeployError, DeployResult};
use crate::logfile::LogFile;
use crate::script::{self, Fragment, quote, quote_path};
use crate::target::{DeploymentTarget, GitRepository, Source, SourceType};

pub use bitbucket::Bitbucket;
pub use custom_git::CustomGit;
pub use github::Github;
pub use gitlab::Gitlab;
pub use raw::Raw;

/// Fetches a compose source tree into
/// [`Paths::code_dir`](crate::config::Paths::code_dir).
pub trait SourceProvider: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Materialize the source on this host, logging to `log`.
    /// Any previous tree is replaced.
    fn clone_source(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log: &mut LogFile,
    ) -> DeployResult<()>;

    /// Shell fragment doing the same on a remote host, with output
    /// appended to `log_path`. Safe to run repeatedly.
    fn clone_command(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log_path: &Path,
    ) -> DeployResult<Fragment>;
}

/// Select the adapter for a source. Called once per attempt.
#[must_use]
pub fn provider_for(source: &Source) -> Box<dyn SourceProvider> {
    match source {
        Source::Github(repo) => Box::new(Github::new(repo.clone())),
        Source::Gitlab(repo) => Box::new(Gitlab::new(repo.clone())),
        Source::Bitbucket(repo) => Box::new(Bitbucket::new(repo.clone())),
        Source::Git(repo) => Box::new(CustomGit::new(repo.clone())),
        Source::Raw { compose_file } => Box::new(Raw::new(compose_file)),
    }
}

/// Environment variables the credential helper reads the username
/// and secret from.
const USERNAME_VAR: &str = "SHIPWRIGHT_GIT_USERNAME";
const SECRET_VAR: &str = "SHIPWRIGHT_GIT_SECRET";

/// A resolved clone: where from, which branch, and how to
/// authenticate. Credentials never enter the URL, so they stay out
/// of `git`'s argument list and out of the checkout's `.git/config`.
#[derive(Clone, PartialEq, Eq)]
pub struct GitRemote {
    pub url: String,
    pub branch: String,
    /// `(username, secret)` answered by an inline credential helper.
    pub credentials: Option<(String, String)>,
    pub ssh_key: Option<String>,
}

impl GitRemote {
    /// `https://<host>/<path>.git`.
    #[must_use]
    pub fn https(
        host: &str,
        repo: &GitRepository,
        credentials: Option<(&str, &str)>,
    ) -> Self {
        let path = repo.repository.trim_matches('/').trim_end_matches(".git");
        Self {
            url: format!("https://{host}/{path}.git"),
            branch: repo.branch.clone(),
            credentials: credentials.map(|(user, secret)| (user.to_string(), secret.to_string())),
            ssh_key: repo.ssh_key.clone(),
        }
    }

    fn secret(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(_, secret)| secret.as_str())
    }

    /// Shell command performing the clone. Meant to be fed to a
    /// shell on stdin: it carries the secret in a variable
    /// assignment.
    fn git_command(&self, dest: &Path) -> String {
        let mut command = String::new();
        if let Some(key) = &self.ssh_key {
            let ssh = format!("ssh -i {} -o StrictHostKeyChecking=accept-new", quote(key));
            command.push_str(&format!("GIT_SSH_COMMAND={} ", quote(&ssh)));
        }
        command.push_str("GIT_TERMINAL_PROMPT=0 ");
        let mut config = String::new();
        if let Some((user, secret)) = &self.credentials {
            command.push_str(&format!(
                "{USERNAME_VAR}={} {SECRET_VAR}={} ",
                quote(user),
                quote(secret)
            ));
            let helper = format!(
                "!f() {{ test \"$1\" = get && echo \"username=${USERNAME_VAR}\" && echo \"password=${SECRET_VAR}\"; }}; f"
            );
            // The empty helper drops any configured ones first.
            config = format!("-c credential.helper= -c {} ", quote(&format!("credential.helper={helper}")));
        }
        command.push_str(&format!(
            "git {config}clone --branch {} --depth 1 --recurse-submodules --progress {} {}",
            quote(&self.branch),
            quote(&self.url),
            quote_path(dest),
        ));
        command
    }

    fn redact(&self, text: &str) -> String {
        match self.secret() {
            Some(secret) => script::redact(text, &[secret.to_string()]),
            None => text.to_string(),
        }
    }

    /// Clone into `dest` on this host, replacing whatever is there.
    pub fn clone_local(&self, dest: &Path, log: &mut LogFile) -> DeployResult<()> {
        log.banner(&format!(
            "Cloning {} ({}) to {}",
            self.url,
            self.branch,
            dest.display()
        ))?;

        if dest.exists() {
            debug!(dest = %dest.display(), "removing previous source tree");
            std::fs::remove_dir_all(dest)?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let output = cmd::run_with_stdin("sh", &["-s"], self.git_command(dest).as_bytes())?;
        log.output(&self.redact(&output.stdout))?;
        log.output(&self.redact(&output.stderr))?;

        if !output.success() {
            return Err(DeployError::SourceFetch(format!(
                "failed to clone {} ({}): {}",
                self.url,
                self.branch,
                self.redact(output.stderr.trim())
            )));
        }

        log.line(&format!("Cloned {}: done", self.url))?;
        info!(repo = %self.url, branch = %self.branch, "source cloned");
        Ok(())
    }

    /// Remote equivalent of [`GitRemote::clone_local`].
    #[must_use]
    pub fn clone_fragment(&self, dest: &Path, log_path: &Path) -> Fragment {
        let mut fragment = Fragment::new();
        if let Some(secret) = self.secret() {
            fragment.mark_secret(secret);
            fragment.mark_secret(&secret.replace('\'', r"'\''"));
        }

        fragment.echo(
            &format!("==> Cloning {} ({}) to {}", self.url, self.branch, dest.display()),
            log_path,
        );
        fragment.line(&format!("rm -rf {};", quote_path(dest)));
        if let Some(parent) = dest.parent() {
            fragment.line(&format!("mkdir -p {};", quote_path(parent)));
        }
        fragment.gated(
            &self.git_command(dest),
            log_path,
            &format!("ERROR: failed to clone {}", self.url),
        );
        fragment.echo(&format!("Cloned {}: done", self.url), log_path);
        fragment
    }
}

impl std::fmt::Debug for GitRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRemote")
            .field("url", &self.url)
            .field("branch", &self.branch)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("ssh_key", &self.ssh_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_without_credentials() {
        let repo = GitRepository::new("acme/blog.git").branch("prod");
        let remote = GitRemote::https("github.com", &repo, None);

        assert_eq!(remote.url, "https://github.com/acme/blog.git");
        assert_eq!(remote.branch, "prod");
        assert!(remote.credentials.is_none());
        assert!(!remote.git_command(Path::new("/srv/code")).contains("credential.helper"));
    }

    #[test]
    fn credentials_stay_out_of_the_url_and_debug() {
        let repo = GitRepository::new("/acme/blog/");
        let remote = GitRemote::https("github.com", &repo, Some(("x-access-token", "p@ss/w:rd")));

        assert_eq!(remote.url, "https://github.com/acme/blog.git");
        assert!(!format!("{remote:?}").contains("p@ss"));

        let command = remote.git_command(Path::new("/srv/code"));
        assert!(command.contains("SHIPWRIGHT_GIT_SECRET='p@ss/w:rd' "));
        let git_args = &command[command.find("git -c").unwrap()..];
        assert!(!git_args.contains("p@ss"));
        assert!(git_args.contains("'https://github.com/acme/blog.git'"));
    }

    #[test]
    fn fragment_replaces_previous_tree() {
        let repo = GitRepository::new("acme/blog").ssh_key("/keys/deploy");
        let remote = GitRemote::https("github.com", &repo, Some(("x-access-token", "tok")));
        let fragment =
            remote.clone_fragment(Path::new("/srv/blog/code"), Path::new("/logs/blog.log"));
        let text = fragment.as_str();

        let rm = text.find("rm -rf '/srv/blog/code';").unwrap();
        let clone = text.find("git clone").unwrap();
        assert!(rm < clone);
        assert!(text.contains("mkdir -p '/srv/blog';"));
        assert!(text.contains("GIT_SSH_COMMAND="));
        assert!(text.contains("exit 1;"));
        assert!(text.contains("SHIPWRIGHT_GIT_SECRET='tok'"));
        assert!(!fragment.redacted().contains("'tok'"));
    }

    #[test]
    fn provider_selection_matches_source() {
        let repo = GitRepository::new("acme/blog");
        let cases = [
            (Source::Github(repo.clone()), SourceType::Github),
            (Source::Gitlab(repo.clone()), SourceType::Gitlab),
            (Source::Bitbucket(repo.clone()), SourceType::Bitbucket),
            (Source::Git(repo), SourceType::Git),
            (Source::raw("services: {}"), SourceType::Raw),
        ];

        for (source, expected) in cases {
            assert_eq!(provider_for(&source).source_type(), expected);
        }
    }
}
