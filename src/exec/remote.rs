use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::exec::{CommandOutput, Executor};
use crate::ssh::SshSession;
use crate::target::Server;

/// Sends a whole script to a server over SSH and runs it there in
/// one round trip.
pub struct RemoteExecutor {
    server_id: String,
    session: SshSession,
}

impl RemoteExecutor {
    #[must_use]
    pub fn new(server: &Server) -> Self {
        let mut session = SshSession::new(&server.host, &server.user).with_port(server.port);
        if let Some(key) = &server.key {
            session = session.with_key(key);
        }
        Self::with_session(&server.id, session)
    }

    #[must_use]
    pub fn with_session(server_id: &str, session: SshSession) -> Self {
        Self {
            server_id: server_id.to_string(),
            session,
        }
    }
}

impl Executor for RemoteExecutor {
    fn location(&self) -> String {
        self.session.destination()
    }

    fn run(&self, command: &str) -> DeployResult<CommandOutput> {
        debug!(
            server = %self.server_id,
            bytes = command.len(),
            "sending script to {}",
            self.session.destination()
        );

        let output = self.session.exec_script(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::Execution {
                command: format!("remote script on {}", self.session.destination()),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
