use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};
use crate::target::DeploymentTarget;

pub const DEFAULT_COMPOSE_ROOT: &str = "/etc/shipwright/compose";
pub const DEFAULT_LOGS_ROOT: &str = "/etc/shipwright/logs";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Directory layout shared by local and remote hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    /// Per-target working directories live under
    /// `<compose_root>/<app_name>`.
    pub compose_root: PathBuf,
    pub logs_root: PathBuf,
}

impl Paths {
    #[must_use]
    pub fn new(compose_root: &Path, logs_root: &Path) -> Self {
        Self {
            compose_root: compose_root.to_path_buf(),
            logs_root: logs_root.to_path_buf(),
        }
    }

    /// Deployment directory of a target.
    #[must_use]
    pub fn app_dir(&self, app_name: &str) -> PathBuf {
        self.compose_root.join(app_name)
    }

    /// Where the source tree is cloned or written.
    #[must_use]
    pub fn code_dir(&self, app_name: &str) -> PathBuf {
        self.app_dir(app_name).join("code")
    }

    /// Log directory of a target.
    #[must_use]
    pub fn log_dir(&self, app_name: &str) -> PathBuf {
        self.logs_root.join(app_name)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(
            Path::new(DEFAULT_COMPOSE_ROOT),
            Path::new(DEFAULT_LOGS_ROOT),
        )
    }
}

/// File-based configuration: where things live and what can be
/// deployed.
///
/// ```yaml
/// base_url: https://deploy.example.com
/// compose_root: /srv/compose
/// targets:
///   - app_name: blog
///     kind: compose
///     source:
///       type: github
///       repository: acme/blog
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_compose_root")]
    pub compose_root: PathBuf,
    #[serde(default = "default_logs_root")]
    pub logs_root: PathBuf,
    /// Identity file for servers that don't set their own.
    #[serde(default)]
    pub ssh_key: Option<String>,
    #[serde(default)]
    pub targets: Vec<DeploymentTarget>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_compose_root() -> PathBuf {
    PathBuf::from(DEFAULT_COMPOSE_ROOT)
}

fn default_logs_root() -> PathBuf {
    PathBuf::from(DEFAULT_LOGS_ROOT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            compose_root: default_compose_root(),
            logs_root: default_logs_root(),
            ssh_key: None,
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            return Err(DeployError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> DeployResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override settings from `SHIPWRIGHT_*` variables. `lookup`
    /// is injected so tests don't touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SHIPWRIGHT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(root) = lookup("SHIPWRIGHT_COMPOSE_ROOT") {
            self.compose_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("SHIPWRIGHT_LOGS_ROOT") {
            self.logs_root = PathBuf::from(root);
        }
    }

    #[must_use]
    pub fn paths(&self) -> Paths {
        Paths::new(&self.compose_root, &self.logs_root)
    }
}
