//! Image pull primitive used by local image deployments.

use tracing::debug;

use crate::cmd;
use crate::error::{DeployError, DeployResult};
use crate::target::RegistryCredentials;

/// Pulls images, reporting each status line through `on_progress`.
pub trait Registry: Send + Sync {
    /// Log in with `auth` when given, then pull `image`. A failed
    /// login aborts the pull.
    fn pull(
        &self,
        image: &str,
        auth: Option<&RegistryCredentials>,
        on_progress: &mut dyn FnMut(&str),
    ) -> DeployResult<()>;
}

/// Talks to the local Docker daemon through the `docker` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli;

impl DockerCli {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn login(auth: &RegistryCredentials) -> DeployResult<()> {
        let server = auth.server_address();
        debug!(user = %auth.username, %server, "logging in to registry");

        let args = [
            "login",
            "--username",
            auth.username.as_str(),
            "--password-stdin",
            server,
        ];
        let output = cmd::run_with_stdin("docker", &args, auth.password.as_bytes())?;
        if output.success() {
            Ok(())
        } else {
            Err(cmd::failure("docker", &args, &output))
        }
    }
}

impl Registry for DockerCli {
    fn pull(
        &self,
        image: &str,
        auth: Option<&RegistryCredentials>,
        on_progress: &mut dyn FnMut(&str),
    ) -> DeployResult<()> {
        if image.trim().is_empty() {
            return Err(DeployError::MissingArtifact("docker image not set".into()));
        }
        if let Some(auth) = auth {
            Self::login(auth)?;
        }
        cmd::run_streaming("docker", &["pull", image], on_progress)
    }
}
