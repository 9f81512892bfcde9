use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Status of a single deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Running,
    Done,
    Error,
}

impl DeploymentStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Only `running -> done` and `running -> error` are allowed.
    pub fn transition(self, to: Self) -> DeployResult<Self> {
        if self == Self::Running && to.is_terminal() {
            Ok(to)
        } else {
            Err(DeployError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// One attempt to realize a target's current definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub target_id: String,
    pub title: String,
    pub description: String,
    pub log_path: PathBuf,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for allocating a new deployment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub target_id: String,
    pub title: String,
    pub description: String,
}

impl NewDeployment {
    #[must_use]
    pub fn new(target_id: &str, title: &str, description: &str) -> Self {
        Self {
            target_id: target_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}
