//! Execution strategies: run a command string either on this host
//! or on a remote server over SSH.

pub mod local;
pub mod remote;

use std::path::Path;
use std::process::Output;

use crate::error::DeployResult;
use crate::target::Server;

pub use local::LocalExecutor;
pub use remote::RemoteExecutor;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal: no exit code, report as generic failure.
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Runs a command somewhere and waits for it to finish.
///
/// A non-zero exit is reported as
/// [`DeployError::Execution`](crate::error::DeployError::Execution);
/// implementations that talk to another machine report channel
/// failures as
/// [`DeployError::Transport`](crate::error::DeployError::Transport).
pub trait Executor: Send + Sync {
    /// Human readable description of where commands run.
    fn location(&self) -> String;

    /// Run `command` through a POSIX shell.
    fn run(&self, command: &str) -> DeployResult<CommandOutput>;
}

/// Picks the execution strategy for a target.
pub trait ExecutorFactory: Send + Sync {
    /// `server` is the target's remote machine, if any. `workdir`
    /// is the deployment directory used by local execution.
    fn executor(&self, server: Option<&Server>, workdir: &Path) -> Box<dyn Executor>;
}

/// Default factory: local subprocesses, or SSH when the target has
/// a server attached.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutors {
    ssh_key: Option<String>,
}

impl SystemExecutors {
    #[must_use]
    pub const fn new() -> Self {
        Self { ssh_key: None }
    }

    /// Fallback identity file for servers that don't declare one.
    #[must_use]
    pub fn ssh_key(mut self, key_path: &str) -> Self {
        self.ssh_key = Some(key_path.to_string());
        self
    }
}

impl ExecutorFactory for SystemExecutors {
    fn executor(&self, server: Option<&Server>, workdir: &Path) -> Box<dyn Executor> {
        match server {
            Some(server) => {
                let mut server = server.clone();
                if server.key.is_none() {
                    server.key.clone_from(&self.ssh_key);
                }
                Box::new(RemoteExecutor::new(&server))
            }
            None => Box::new(LocalExecutor::new(workdir)),
        }
    }
}
