//! Deployment orchestration: one attempt per call, from record
//! creation to the terminal status write and notification.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::attempt::{Attempt, Outcome, Stage};
use crate::build;
use crate::compose;
use crate::config::{DEFAULT_BASE_URL, Paths};
use crate::deployment::{Deployment, NewDeployment};
use crate::error::{DeployError, DeployResult};
use crate::exec::{Executor, ExecutorFactory, SystemExecutors};
use crate::lock::TargetLocks;
use crate::logfile::LogFile;
use crate::notify::{BuildFailure, BuildSuccess, Notifier, TracingNotifier};
use crate::registry::{DockerCli, Registry};
use crate::script::{self, Fragment, Script, quote_path};
use crate::source;
use crate::status::{DeploymentFactory, StatusTracker};
use crate::target::{ComposeSpec, DeploymentTarget, SourceType, TargetKind, TargetStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Fetch the source, then build.
    Deploy,
    /// Build what is already on disk.
    Rebuild,
}

/// Runs deployments against a status store.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use shipwright::pipeline::Pipeline;
/// use shipwright::store::MemoryStore;
/// use shipwright::target::{DeploymentTarget, GitRepository, Source};
///
/// let store = Arc::new(MemoryStore::new("/var/log/shipwright"));
/// store.insert_target(
///     DeploymentTarget::compose("blog", Source::Github(GitRepository::new("acme/blog")))
///         .id("blog"),
/// )?;
///
/// let pipeline = Pipeline::new(store).base_url("https://deploy.example.com");
/// pipeline.deploy("blog", "Manual deployment", "")?;
/// # Ok::<(), shipwright::error::DeployError>(())
/// ```
pub struct Pipeline {
    tracker: Arc<dyn StatusTracker>,
    records: Arc<dyn DeploymentFactory>,
    executors: Box<dyn ExecutorFactory>,
    registry: Box<dyn Registry>,
    notifier: Box<dyn Notifier>,
    paths: Paths,
    base_url: String,
    locks: TargetLocks,
}

impl Pipeline {
    /// Pipeline backed by `store`, using local and SSH execution,
    /// the Docker CLI and log-based notifications.
    #[must_use]
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: StatusTracker + DeploymentFactory + 'static,
    {
        Self {
            tracker: Arc::clone(&store) as Arc<dyn StatusTracker>,
            records: store,
            executors: Box::new(SystemExecutors::new()),
            registry: Box::new(DockerCli::new()),
            notifier: Box::new(TracingNotifier),
            paths: Paths::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            locks: TargetLocks::new(),
        }
    }

    #[must_use]
    pub fn executors(mut self, executors: impl ExecutorFactory + 'static) -> Self {
        self.executors = Box::new(executors);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: impl Registry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    #[must_use]
    pub fn paths(mut self, paths: Paths) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Fetch the target's source and build it. The returned
    /// deployment carries its terminal status; on failure the
    /// attempt's error is returned after the status write.
    #[instrument(skip(self, title, description))]
    pub fn deploy(
        &self,
        target_id: &str,
        title: &str,
        description: &str,
    ) -> DeployResult<Deployment> {
        self.attempt(target_id, title, description, Mode::Deploy)
    }

    /// Build again from the existing source tree, without fetching
    /// and without notifying.
    #[instrument(skip(self, title, description))]
    pub fn rebuild(
        &self,
        target_id: &str,
        title: &str,
        description: &str,
    ) -> DeployResult<Deployment> {
        self.attempt(target_id, title, description, Mode::Rebuild)
    }

    /// Stop what the target runs. Stacks have nothing to stop and
    /// go idle directly.
    #[instrument(skip(self))]
    pub fn stop(&self, target_id: &str) -> DeployResult<()> {
        let target = self.tracker.find_target(target_id)?;

        let result = match build::stop_command(&target) {
            Some(command) => self.executor_for(&target).run(&command).map(|_| ()),
            None => {
                info!(app = %target.app_name, "stack targets have no stop command");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.tracker
                    .update_target_status(&target.id, TargetStatus::Idle)?;
                info!(app = %target.app_name, "stopped");
                Ok(())
            }
            Err(e) => {
                if let Err(write) = self
                    .tracker
                    .update_target_status(&target.id, TargetStatus::Error)
                {
                    warn!(app = %target.app_name, error = %write, "failed to record stop failure");
                }
                error!(app = %target.app_name, error = %e, "stop failed");
                Err(e)
            }
        }
    }

    /// Tear down everything the target runs. Status and record
    /// cleanup are left to the caller.
    #[instrument(skip(self))]
    pub fn remove(&self, target_id: &str) -> DeployResult<()> {
        let target = self.tracker.find_target(target_id)?;
        let command = build::remove_command(&target);
        self.executor_for(&target).run(&command)?;
        info!(app = %target.app_name, "removed");
        Ok(())
    }

    /// Service names declared by a compose target, fetching the
    /// source first when `fetch` is set.
    #[instrument(skip(self))]
    pub fn load_services(&self, target_id: &str, fetch: bool) -> DeployResult<Vec<String>> {
        let target = self.tracker.find_target(target_id)?;
        let spec = target.compose_spec().ok_or_else(|| {
            DeployError::MissingArtifact(format!("{} is not a compose target", target.app_name))
        })?;
        let file = build::compose_file(&target, spec, &self.paths);
        let log_path = self.paths.log_dir(&target.app_name).join("services.log");

        let compose = if target.is_remote() {
            let mut script = Script::new();
            if fetch {
                let provider = source::provider_for(&spec.source);
                script = script
                    .push(script::prepare_log(&log_path))
                    .push(provider.clone_command(&target, &self.paths, &log_path)?);
            }
            let mut read = Fragment::new();
            read.line(&format!("cat {};", quote_path(&file)));
            let output = self.executor_for(&target).run(script.push(read).render())?;
            let compose = compose::parse(&output.stdout)?;
            // Remote checkouts are never rewritten on disk.
            match git_suffix(spec) {
                Some(suffix) => compose::randomize(compose, suffix),
                None => compose,
            }
        } else {
            if fetch {
                let mut log = LogFile::open(&log_path)?;
                self.acquire_source(&target, spec, &mut log)?;
            }
            compose::load(&file)?
        };

        let services = compose::service_names(&compose);
        if services.is_empty() {
            return Err(DeployError::NotFound(format!(
                "no services in {}",
                file.display()
            )));
        }
        Ok(services)
    }

    /// The script a remote deploy of `target` sends, with output
    /// going to `log_path` on the remote host.
    pub fn remote_script(&self, target: &DeploymentTarget, log_path: &Path) -> DeployResult<Script> {
        build::ensure_artifact(target)?;
        let script = Script::new().push(script::prepare_log(log_path));
        match &target.kind {
            TargetKind::Compose(spec) => {
                let provider = source::provider_for(&spec.source);
                Ok(script
                    .push(provider.clone_command(target, &self.paths, log_path)?)
                    .push(build::compose_fragment(target, &self.paths, log_path)?))
            }
            TargetKind::Image(_) => Ok(script.push(build::image_fragment(target, log_path)?)),
        }
    }

    fn rebuild_script(&self, target: &DeploymentTarget, log_path: &Path) -> DeployResult<Script> {
        let script = Script::new().push(script::prepare_log(log_path));
        match &target.kind {
            TargetKind::Compose(_) => {
                Ok(script.push(build::compose_fragment(target, &self.paths, log_path)?))
            }
            TargetKind::Image(_) => Ok(script.push(build::image_fragment(target, log_path)?)),
        }
    }

    fn executor_for(&self, target: &DeploymentTarget) -> Box<dyn Executor> {
        self.executors.executor(
            target.server.as_ref(),
            &self.paths.app_dir(&target.app_name),
        )
    }

    fn attempt(
        &self,
        target_id: &str,
        title: &str,
        description: &str,
        mode: Mode,
    ) -> DeployResult<Deployment> {
        let target = self.tracker.find_target(target_id)?;
        let _guard = self.locks.acquire(&target.id)?;
        let deployment = self
            .records
            .create_deployment(&NewDeployment::new(&target.id, title, description))?;
        info!(
            app = %target.app_name,
            deployment = %deployment.id,
            ?mode,
            remote = target.is_remote(),
            "deployment started"
        );

        let outcome = self.run(&target, deployment, mode);
        self.settle(&target, outcome, mode == Mode::Deploy)
    }

    fn run(&self, target: &DeploymentTarget, deployment: Deployment, mode: Mode) -> Outcome {
        let mut attempt = Attempt::new();
        let result = LogFile::open(&deployment.log_path).and_then(|mut log| {
            let result = self.drive(target, &deployment, mode, &mut attempt, &mut log);
            if let Err(e) = &result {
                let _ = log.line(&format!("ERROR: {e}"));
            }
            result
        });
        attempt.finish(result.is_ok());

        Outcome {
            deployment,
            stages: attempt.into_stages(),
            result,
        }
    }

    fn drive(
        &self,
        target: &DeploymentTarget,
        deployment: &Deployment,
        mode: Mode,
        attempt: &mut Attempt,
        log: &mut LogFile,
    ) -> DeployResult<()> {
        build::ensure_artifact(target)?;
        let executor = self.executor_for(target);

        if target.is_remote() {
            let script = match mode {
                Mode::Deploy => self.remote_script(target, &deployment.log_path)?,
                Mode::Rebuild => self.rebuild_script(target, &deployment.log_path)?,
            };
            log.banner(&format!("Running on {}", executor.location()))?;
            debug!(script = %script.redacted(), "sending remote script");
            executor.run(script.render()).map_err(|e| match e {
                DeployError::Execution {
                    command,
                    exit_code,
                    stderr,
                } => DeployError::Execution {
                    command,
                    exit_code,
                    stderr: script.scrub(&stderr),
                },
                other => other,
            })?;

            if mode == Mode::Deploy {
                attempt.advance(Stage::SourceAcquired)?;
            }
            return attempt.advance(Stage::Built);
        }

        if mode == Mode::Deploy {
            if let TargetKind::Compose(spec) = &target.kind {
                self.acquire_source(target, spec, log)?;
            }
            attempt.advance(Stage::SourceAcquired)?;
        }

        match &target.kind {
            TargetKind::Compose(_) => {
                build::build_compose(target, &self.paths, executor.as_ref(), log)?;
            }
            TargetKind::Image(_) => {
                build::build_image(target, self.registry.as_ref(), executor.as_ref(), log)?;
            }
        }
        attempt.advance(Stage::Built)
    }

    /// Local clone or write, then randomize git checkouts. Inline
    /// files are randomized before they are written.
    fn acquire_source(
        &self,
        target: &DeploymentTarget,
        spec: &ComposeSpec,
        log: &mut LogFile,
    ) -> DeployResult<()> {
        source::provider_for(&spec.source).clone_source(target, &self.paths, log)?;

        if let Some(suffix) = git_suffix(spec) {
            compose::randomize_file(&build::compose_file(target, spec, &self.paths), suffix)?;
            log.line(&format!("Randomized compose file with suffix {suffix}"))?;
        }
        Ok(())
    }

    fn settle(
        &self,
        target: &DeploymentTarget,
        outcome: Outcome,
        notify: bool,
    ) -> DeployResult<Deployment> {
        let status = outcome.status();
        let Outcome {
            mut deployment,
            stages,
            result,
        } = outcome;

        let recorded = self
            .tracker
            .update_deployment_status(&deployment.id, status)
            .and_then(|()| self.tracker.update_target_status(&target.id, status.into()));
        deployment.status = status;

        if notify {
            self.notify(target, result.as_ref().err());
        }

        match result {
            Ok(()) => {
                recorded?;
                info!(app = %target.app_name, deployment = %deployment.id, ?stages, "deployment done");
                Ok(deployment)
            }
            Err(e) => {
                if let Err(write) = recorded {
                    warn!(deployment = %deployment.id, error = %write, "failed to record deployment status");
                }
                error!(app = %target.app_name, deployment = %deployment.id, ?stages, error = %e, "deployment failed");
                Err(e)
            }
        }
    }

    fn notify(&self, target: &DeploymentTarget, failure: Option<&DeployError>) {
        let delivered = match failure {
            None => self
                .notifier
                .notify_success(&BuildSuccess::new(target, &self.base_url)),
            Some(e) => self.notifier.notify_error(&BuildFailure::new(
                target,
                &self.base_url,
                &e.to_string(),
            )),
        };
        if let Err(e) = delivered {
            warn!(app = %target.app_name, error = %e, "notification failed");
        }
    }
}

/// Suffix to randomize a git checkout with. Inline files are
/// randomized before they are written, so they never get one.
fn git_suffix(spec: &ComposeSpec) -> Option<&str> {
    if !spec.randomize || source::provider_for(&spec.source).source_type() == SourceType::Raw {
        return None;
    }
    spec.suffix.as_deref().filter(|s| !s.is_empty())
}
