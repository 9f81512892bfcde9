use crate::cmd;
use crate::error::{DeployError, DeployResult};
use crate::exec::CommandOutput;

/// Exit status `ssh` itself uses for connection and
/// authentication failures.
pub const SSH_TRANSPORT_EXIT: i32 = 255;

/// SSH session wrapper for executing scripts on a remote host.
pub struct SshSession {
    program: String,
    host: String,
    user: String,
    port: u16,
    key: Option<String>,
}

impl SshSession {
    #[must_use]
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            program: "ssh".to_string(),
            host: host.to_string(),
            user: user.to_string(),
            port: 22,
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }

    /// Use another client binary instead of `ssh` from `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Execute a script on the remote host. The script is streamed
    /// to `bash -s` on stdin so it never shows up in a process
    /// argument list on either side.
    ///
    /// Returns the remote output whatever the exit code, except
    /// when `ssh` reports a channel failure, which becomes
    /// [`DeployError::Transport`].
    pub fn exec_script(&self, script: &str) -> DeployResult<CommandOutput> {
        let args = self.build_ssh_args("bash -s");
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = cmd::run_with_stdin(&self.program, &refs, script.as_bytes()).map_err(|e| match e {
            DeployError::CommandNotFound(_) => {
                DeployError::Transport("ssh client not installed".into())
            }
            DeployError::Io(e) => DeployError::Transport(format!("{}: {e}", self.destination())),
            other => other,
        })?;

        if output.exit_code == SSH_TRANSPORT_EXIT {
            return Err(DeployError::Transport(format!(
                "{}: {}",
                self.destination(),
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.ssh_base_args();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }
}
