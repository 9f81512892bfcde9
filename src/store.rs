//! In-memory target and deployment store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::deployment::{Deployment, DeploymentStatus, NewDeployment};
use crate::error::{DeployError, DeployResult};
use crate::status::{DeploymentFactory, StatusTracker};
use crate::target::{DeploymentTarget, TargetStatus};

/// Keeps targets and deployment records for the lifetime of the
/// process. Log files are written under `logs_root`.
#[derive(Debug)]
pub struct MemoryStore {
    logs_root: PathBuf,
    targets: Mutex<HashMap<String, DeploymentTarget>>,
    deployments: Mutex<Vec<Deployment>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new(logs_root: impl Into<PathBuf>) -> Self {
        Self {
            logs_root: logs_root.into(),
            targets: Mutex::new(HashMap::new()),
            deployments: Mutex::new(Vec::new()),
        }
    }

    /// Register a target. App names double as directory and
    /// container names, so they must be unique.
    pub fn insert_target(&self, target: DeploymentTarget) -> DeployResult<()> {
        let mut targets = locked(&self.targets);
        if targets.contains_key(&target.id) {
            return Err(DeployError::Conflict(format!(
                "target id already exists: {}",
                target.id
            )));
        }
        if targets.values().any(|t| t.app_name == target.app_name) {
            return Err(DeployError::Conflict(format!(
                "app name already in use: {}",
                target.app_name
            )));
        }
        targets.insert(target.id.clone(), target);
        Ok(())
    }

    /// Look a target up by id, falling back to its app name.
    pub fn resolve(&self, key: &str) -> DeployResult<DeploymentTarget> {
        let targets = locked(&self.targets);
        targets
            .get(key)
            .or_else(|| targets.values().find(|t| t.app_name == key))
            .cloned()
            .ok_or_else(|| DeployError::NotFound(format!("target {key}")))
    }

    #[must_use]
    pub fn targets(&self) -> Vec<DeploymentTarget> {
        let mut targets: Vec<_> = locked(&self.targets).values().cloned().collect();
        targets.sort_by(|a, b| a.app_name.cmp(&b.app_name));
        targets
    }

    pub fn remove_target(&self, target_id: &str) -> DeployResult<DeploymentTarget> {
        let target = locked(&self.targets)
            .remove(target_id)
            .ok_or_else(|| DeployError::NotFound(format!("target {target_id}")))?;
        locked(&self.deployments).retain(|d| d.target_id != target_id);
        Ok(target)
    }

    /// Deployments of a target, newest first.
    #[must_use]
    pub fn list_deployments(&self, target_id: &str) -> Vec<Deployment> {
        let mut deployments: Vec<_> = locked(&self.deployments)
            .iter()
            .filter(|d| d.target_id == target_id)
            .cloned()
            .collect();
        deployments.reverse();
        deployments
    }

    pub fn find_deployment(&self, deployment_id: &str) -> DeployResult<Deployment> {
        locked(&self.deployments)
            .iter()
            .find(|d| d.id == deployment_id)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(format!("deployment {deployment_id}")))
    }
}

impl StatusTracker for MemoryStore {
    fn find_target(&self, target_id: &str) -> DeployResult<DeploymentTarget> {
        locked(&self.targets)
            .get(target_id)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(format!("target {target_id}")))
    }

    fn update_deployment_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
    ) -> DeployResult<()> {
        let mut deployments = locked(&self.deployments);
        let deployment = deployments
            .iter_mut()
            .find(|d| d.id == deployment_id)
            .ok_or_else(|| DeployError::NotFound(format!("deployment {deployment_id}")))?;
        deployment.status = deployment.status.transition(status)?;
        debug!(deployment = %deployment_id, %status, "deployment status updated");
        Ok(())
    }

    fn update_target_status(&self, target_id: &str, status: TargetStatus) -> DeployResult<()> {
        let mut targets = locked(&self.targets);
        let target = targets
            .get_mut(target_id)
            .ok_or_else(|| DeployError::NotFound(format!("target {target_id}")))?;
        target.status = status;
        debug!(target = %target_id, ?status, "target status updated");
        Ok(())
    }
}

impl DeploymentFactory for MemoryStore {
    fn create_deployment(&self, new: &NewDeployment) -> DeployResult<Deployment> {
        let target = self.find_target(&new.target_id)?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let file_name = format!(
            "{}-{}-{}.log",
            target.app_name,
            created_at.format("%Y-%m-%d-%H-%M-%S"),
            &id[..8]
        );
        let log_path = self.logs_root.join(&target.app_name).join(file_name);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&log_path)?;

        let deployment = Deployment {
            id,
            target_id: target.id,
            title: new.title.clone(),
            description: new.description.clone(),
            log_path,
            status: DeploymentStatus::Running,
            created_at,
        };
        locked(&self.deployments).push(deployment.clone());
        debug!(deployment = %deployment.id, log = %deployment.log_path.display(), "deployment created");
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Source;

    fn store(dir: &std::path::Path) -> MemoryStore {
        let store = MemoryStore::new(dir);
        store
            .insert_target(DeploymentTarget::compose("blog", Source::raw("services: {}")).id("t1"))
            .unwrap();
        store
    }

    #[test]
    fn duplicate_app_name_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let err = store
            .insert_target(DeploymentTarget::image("blog", "nginx").id("t2"))
            .unwrap_err();
        assert!(matches!(err, DeployError::Conflict(_)));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.find_target("missing"),
            Err(DeployError::NotFound(_))
        ));
        assert_eq!(store.resolve("blog").unwrap().id, "t1");
    }

    #[test]
    fn creates_distinct_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let first = store
            .create_deployment(&NewDeployment::new("t1", "one", ""))
            .unwrap();
        let second = store
            .create_deployment(&NewDeployment::new("t1", "two", ""))
            .unwrap();

        assert_ne!(first.log_path, second.log_path);
        assert!(first.log_path.exists());
        assert!(first.log_path.starts_with(dir.path().join("blog")));
        assert_eq!(first.status, DeploymentStatus::Running);

        let listed = store.list_deployments("t1");
        assert_eq!(listed[0].title, "two");
        assert_eq!(listed[1].title, "one");
    }

    #[test]
    fn terminal_status_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let deployment = store
            .create_deployment(&NewDeployment::new("t1", "deploy", ""))
            .unwrap();

        store
            .update_deployment_status(&deployment.id, DeploymentStatus::Done)
            .unwrap();
        let err = store
            .update_deployment_status(&deployment.id, DeploymentStatus::Error)
            .unwrap_err();

        assert!(matches!(err, DeployError::InvalidTransition { .. }));
        assert_eq!(
            store.find_deployment(&deployment.id).unwrap().status,
            DeploymentStatus::Done
        );
    }

    #[test]
    fn removing_a_target_drops_its_deployments() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .create_deployment(&NewDeployment::new("t1", "deploy", ""))
            .unwrap();

        store.remove_target("t1").unwrap();

        assert!(store.list_deployments("t1").is_empty());
        assert!(store.targets().is_empty());
    }
}
