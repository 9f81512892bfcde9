//! Seams between the pipeline and wherever targets and deployment
//! records are stored.

use crate::deployment::{Deployment, DeploymentStatus, NewDeployment};
use crate::error::DeployResult;
use crate::target::{DeploymentTarget, TargetStatus};

/// Reads targets and records status changes.
pub trait StatusTracker: Send + Sync {
    /// Fails with [`DeployError::NotFound`] for an unknown id.
    ///
    /// [`DeployError::NotFound`]: crate::error::DeployError::NotFound
    fn find_target(&self, target_id: &str) -> DeployResult<DeploymentTarget>;

    fn update_deployment_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
    ) -> DeployResult<()>;

    fn update_target_status(&self, target_id: &str, status: TargetStatus) -> DeployResult<()>;
}

/// Allocates deployment records.
pub trait DeploymentFactory: Send + Sync {
    /// Create a record in `running` with a fresh log file path.
    /// The log file itself exists once this returns.
    fn create_deployment(&self, new: &NewDeployment) -> DeployResult<Deployment>;
}

impl From<DeploymentStatus> for TargetStatus {
    fn from(status: DeploymentStatus) -> Self {
        match status {
            DeploymentStatus::Running => Self::Running,
            DeploymentStatus::Done => Self::Done,
            DeploymentStatus::Error => Self::Error,
        }
    }
}
