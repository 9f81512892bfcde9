use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A remote machine reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub host: String,
    #[serde(default = "default_ssh_user")]
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub key: Option<String>,
}

impl Server {
    #[must_use]
    pub fn new(id: &str, host: &str) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            user: default_ssh_user(),
            port: default_ssh_port(),
            key: None,
        }
    }

    #[must_use]
    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }
}

fn default_ssh_user() -> String {
    "root".to_string()
}

const fn default_ssh_port() -> u16 {
    22
}

/// Which provider a compose source comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Github,
    Gitlab,
    Bitbucket,
    Git,
    Raw,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Git => "git",
            Self::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// Location and credentials of a git repository.
///
/// `repository` is interpreted per provider: `owner/name` for
/// GitHub and Bitbucket, the project path for GitLab, and a full
/// clone URL for a generic git remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepository {
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Overrides the provider's public host (self-hosted GitLab,
    /// GitHub Enterprise).
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Access token or app password.
    #[serde(default)]
    pub token: Option<String>,
    /// Private key used for SSH remotes.
    #[serde(default)]
    pub ssh_key: Option<String>,
}

impl GitRepository {
    #[must_use]
    pub fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            branch: default_branch(),
            host: None,
            username: None,
            token: None,
            ssh_key: None,
        }
    }

    #[must_use]
    pub fn branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    #[must_use]
    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    #[must_use]
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    #[must_use]
    pub fn ssh_key(mut self, key_path: &str) -> Self {
        self.ssh_key = Some(key_path.to_string());
        self
    }
}

fn default_branch() -> String {
    "main".to_string()
}

/// Where the compose specification comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    Github(GitRepository),
    Gitlab(GitRepository),
    Bitbucket(GitRepository),
    Git(GitRepository),
    /// Compose file stored inline on the target.
    Raw { compose_file: String },
}

impl Source {
    #[must_use]
    pub const fn kind(&self) -> SourceType {
        match self {
            Self::Github(_) => SourceType::Github,
            Self::Gitlab(_) => SourceType::Gitlab,
            Self::Bitbucket(_) => SourceType::Bitbucket,
            Self::Git(_) => SourceType::Git,
            Self::Raw { .. } => SourceType::Raw,
        }
    }

    #[must_use]
    pub fn raw(compose_file: &str) -> Self {
        Self::Raw {
            compose_file: compose_file.to_string(),
        }
    }
}

/// Dialect used to bring a compose stack up and down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComposeType {
    #[default]
    DockerCompose,
    Stack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeSpec {
    pub source: Source,
    #[serde(default)]
    pub compose_type: ComposeType,
    /// Compose file path relative to the source tree root.
    #[serde(default = "default_compose_path")]
    pub compose_path: String,
    /// Suffix service, volume and network names on load.
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub suffix: Option<String>,
}

fn default_compose_path() -> String {
    "docker-compose.yml".to_string()
}

/// Private registry login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// Registry host; Docker Hub when absent.
    #[serde(default)]
    pub registry: Option<String>,
}

impl RegistryCredentials {
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            registry: None,
        }
    }

    #[must_use]
    pub fn registry(mut self, registry: &str) -> Self {
        self.registry = Some(registry.to_string());
        self
    }

    #[must_use]
    pub fn server_address(&self) -> &str {
        self.registry
            .as_deref()
            .unwrap_or("https://index.docker.io/v1/")
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("registry", &self.registry)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub image: String,
    #[serde(default)]
    pub credentials: Option<RegistryCredentials>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// Published ports in `host:container` form.
    #[serde(default)]
    pub ports: Vec<String>,
}

/// What gets built: a compose stack from a source, or a single
/// prebuilt image. The two paths never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetKind {
    Compose(ComposeSpec),
    Image(ImageSpec),
}

/// Application type as shown in notifications and dashboard links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Compose,
    Application,
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compose => "compose",
            Self::Application => "application",
        })
    }
}

/// Summary status of a target, updated alongside each
/// deployment's terminal transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

/// The persistent definition of something to deploy.
///
/// # Example
///
/// ```
/// use shipwright::target::{ComposeType, DeploymentTarget, Server, Source};
///
/// let target = DeploymentTarget::compose("shop", Source::raw("services: {}"))
///     .name("Shop")
///     .project("proj-1", "Retail")
///     .compose_type(ComposeType::Stack)
///     .server(Server::new("srv-1", "10.0.0.5"));
///
/// assert_eq!(target.app_name, "shop");
/// assert!(target.is_remote());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub app_name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub server: Option<Server>,
    #[serde(default)]
    pub status: TargetStatus,
    #[serde(flatten)]
    pub kind: TargetKind,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl DeploymentTarget {
    #[must_use]
    pub fn compose(app_name: &str, source: Source) -> Self {
        Self::with_kind(
            app_name,
            TargetKind::Compose(ComposeSpec {
                source,
                compose_type: ComposeType::default(),
                compose_path: default_compose_path(),
                randomize: false,
                suffix: None,
            }),
        )
    }

    #[must_use]
    pub fn image(app_name: &str, image: &str) -> Self {
        Self::with_kind(
            app_name,
            TargetKind::Image(ImageSpec {
                image: image.to_string(),
                credentials: None,
                env: IndexMap::new(),
                ports: Vec::new(),
            }),
        )
    }

    fn with_kind(app_name: &str, kind: TargetKind) -> Self {
        Self {
            id: new_id(),
            name: app_name.to_string(),
            app_name: app_name.to_string(),
            project_id: String::new(),
            project_name: String::new(),
            server: None,
            status: TargetStatus::Idle,
            kind,
        }
    }

    #[must_use]
    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn project(mut self, id: &str, name: &str) -> Self {
        self.project_id = id.to_string();
        self.project_name = name.to_string();
        self
    }

    #[must_use]
    pub fn server(mut self, server: Server) -> Self {
        self.server = Some(server);
        self
    }

    /// No-op for image targets.
    #[must_use]
    pub fn compose_type(mut self, compose_type: ComposeType) -> Self {
        if let TargetKind::Compose(spec) = &mut self.kind {
            spec.compose_type = compose_type;
        }
        self
    }

    /// No-op for image targets.
    #[must_use]
    pub fn compose_path(mut self, path: &str) -> Self {
        if let TargetKind::Compose(spec) = &mut self.kind {
            spec.compose_path = path.to_string();
        }
        self
    }

    /// No-op for image targets.
    #[must_use]
    pub fn randomize(mut self, suffix: &str) -> Self {
        if let TargetKind::Compose(spec) = &mut self.kind {
            spec.randomize = true;
            spec.suffix = Some(suffix.to_string());
        }
        self
    }

    /// No-op for compose targets.
    #[must_use]
    pub fn credentials(mut self, credentials: RegistryCredentials) -> Self {
        if let TargetKind::Image(spec) = &mut self.kind {
            spec.credentials = Some(credentials);
        }
        self
    }

    /// No-op for compose targets.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        if let TargetKind::Image(spec) = &mut self.kind {
            spec.env.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// No-op for compose targets.
    #[must_use]
    pub fn port(mut self, mapping: &str) -> Self {
        if let TargetKind::Image(spec) = &mut self.kind {
            spec.ports.push(mapping.to_string());
        }
        self
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.server.is_some()
    }

    #[must_use]
    pub const fn app_type(&self) -> AppType {
        match self.kind {
            TargetKind::Compose(_) => AppType::Compose,
            TargetKind::Image(_) => AppType::Application,
        }
    }

    #[must_use]
    pub const fn compose_spec(&self) -> Option<&ComposeSpec> {
        match &self.kind {
            TargetKind::Compose(spec) => Some(spec),
            TargetKind::Image(_) => None,
        }
    }
}
