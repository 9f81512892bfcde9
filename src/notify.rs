//! Build notifications and dashboard links.

use serde::Serialize;
use tracing::{error, info};

use crate::error::DeployResult;
use crate::target::{AppType, DeploymentTarget};

/// Sent once per successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSuccess {
    pub project_name: String,
    pub application_name: String,
    pub application_type: AppType,
    pub build_link: String,
}

/// Sent once per failed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFailure {
    pub project_name: String,
    pub application_name: String,
    pub application_type: AppType,
    pub error_message: String,
    pub build_link: String,
}

impl BuildSuccess {
    #[must_use]
    pub fn new(target: &DeploymentTarget, base_url: &str) -> Self {
        Self {
            project_name: target.project_name.clone(),
            application_name: target.name.clone(),
            application_type: target.app_type(),
            build_link: build_link(base_url, target),
        }
    }
}

impl BuildFailure {
    #[must_use]
    pub fn new(target: &DeploymentTarget, base_url: &str, message: &str) -> Self {
        Self {
            project_name: target.project_name.clone(),
            application_name: target.name.clone(),
            application_type: target.app_type(),
            error_message: message.to_string(),
            build_link: build_link(base_url, target),
        }
    }
}

/// Delivers build outcomes. Delivery failures are reported to the
/// caller but never change a deployment's result.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, notification: &BuildSuccess) -> DeployResult<()>;
    fn notify_error(&self, notification: &BuildFailure) -> DeployResult<()>;
}

/// Emits notifications as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, notification: &BuildSuccess) -> DeployResult<()> {
        let payload = serde_json::to_string(notification)?;
        info!(
            app = %notification.application_name,
            link = %notification.build_link,
            %payload,
            "build succeeded"
        );
        Ok(())
    }

    fn notify_error(&self, notification: &BuildFailure) -> DeployResult<()> {
        let payload = serde_json::to_string(notification)?;
        error!(
            app = %notification.application_name,
            error = %notification.error_message,
            %payload,
            "build failed"
        );
        Ok(())
    }
}

/// `<base>/dashboard/project/<project>/services/<type>/<id>?tab=deployments`
#[must_use]
pub fn build_link(base_url: &str, target: &DeploymentTarget) -> String {
    format!(
        "{}/dashboard/project/{}/services/{}/{}?tab=deployments",
        base_url.trim_end_matches('/'),
        target.project_id,
        target.app_type(),
        target.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Source;

    #[test]
    fn link_points_at_deployments_tab() {
        let target = DeploymentTarget::compose("shop", Source::raw("services: {}"))
            .id("c1")
            .project("p1", "Retail");

        assert_eq!(
            build_link("https://deploy.example.com/", &target),
            "https://deploy.example.com/dashboard/project/p1/services/compose/c1?tab=deployments"
        );

        let image = DeploymentTarget::image("api", "nginx").id("a1").project("p1", "Retail");
        assert!(build_link("http://x", &image).contains("/services/application/a1?"));
    }

    #[test]
    fn failure_payload_serializes_camel_case() {
        let target = DeploymentTarget::image("api", "nginx")
            .id("a1")
            .name("API")
            .project("p1", "Retail");
        let failure = BuildFailure::new(&target, "http://x", "pull failed");
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["projectName"], "Retail");
        assert_eq!(json["applicationName"], "API");
        assert_eq!(json["applicationType"], "application");
        assert_eq!(json["errorMessage"], "pull failed");
    }
}
