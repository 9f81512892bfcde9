use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cmd;
use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandOutput, Executor};

/// Runs commands as `sh -c` subprocesses on this host, inside the
/// target's deployment directory.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    workdir: PathBuf,
}

impl LocalExecutor {
    #[must_use]
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
        }
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl Executor for LocalExecutor {
    fn location(&self) -> String {
        format!("local:{}", self.workdir.display())
    }

    fn run(&self, command: &str) -> DeployResult<CommandOutput> {
        // Teardown may run before anything was cloned.
        let dir = self.workdir.is_dir().then_some(self.workdir.as_path());
        debug!(workdir = %self.workdir.display(), "running local command");

        let output = cmd::run_shell(dir, command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::Execution {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
