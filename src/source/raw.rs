use std::path::Path;

use tracing::info;

use crate::compose;
use crate::config::Paths;
use crate::error::{DeployError, DeployResult};
use crate::logfile::LogFile;
use crate::script::{Fragment, quote, quote_path};
use crate::source::SourceProvider;
use crate::target::{DeploymentTarget, SourceType, TargetKind};

/// Compose file stored inline on the target. No network step:
/// the compose file is written where a clone would have put it.
#[derive(Debug, Clone)]
pub struct Raw {
    compose_file: String,
}

impl Raw {
    #[must_use]
    pub fn new(compose_file: &str) -> Self {
        Self {
            compose_file: compose_file.to_string(),
        }
    }

    /// The file content to write, randomized when the target asks
    /// for it.
    pub fn content(&self, target: &DeploymentTarget) -> DeployResult<String> {
        if self.compose_file.trim().is_empty() {
            return Err(DeployError::MissingArtifact(format!(
                "compose file of {} is empty",
                target.app_name
            )));
        }
        match &target.kind {
            TargetKind::Compose(spec) if spec.randomize => {
                let suffix = spec.suffix.as_deref().unwrap_or_default();
                if suffix.is_empty() {
                    Ok(self.compose_file.clone())
                } else {
                    compose::randomize_str(&self.compose_file, suffix)
                }
            }
            _ => Ok(self.compose_file.clone()),
        }
    }
}

fn compose_path(target: &DeploymentTarget, paths: &Paths) -> std::path::PathBuf {
    let relative = target
        .compose_spec()
        .map_or("docker-compose.yml", |spec| spec.compose_path.as_str());
    paths.code_dir(&target.app_name).join(relative)
}

impl SourceProvider for Raw {
    fn source_type(&self) -> SourceType {
        SourceType::Raw
    }

    fn clone_source(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log: &mut LogFile,
    ) -> DeployResult<()> {
        let content = self.content(target)?;
        let code_dir = paths.code_dir(&target.app_name);
        let file = compose_path(target, paths);

        log.banner(&format!("Writing compose file to {}", file.display()))?;
        if code_dir.exists() {
            std::fs::remove_dir_all(&code_dir)?;
        }
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file, content)?;
        log.line("Compose file written: done")?;

        info!(app = %target.app_name, path = %file.display(), "raw compose file written");
        Ok(())
    }

    fn clone_command(
        &self,
        target: &DeploymentTarget,
        paths: &Paths,
        log_path: &Path,
    ) -> DeployResult<Fragment> {
        let content = self.content(target)?;
        let code_dir = paths.code_dir(&target.app_name);
        let file = compose_path(target, paths);

        let mut fragment = Fragment::new();
        fragment.echo(
            &format!("==> Writing compose file to {}", file.display()),
            log_path,
        );
        fragment.line(&format!("rm -rf {};", quote_path(&code_dir)));
        if let Some(parent) = file.parent() {
            fragment.line(&format!("mkdir -p {};", quote_path(parent)));
        }
        fragment.line(&format!(
            "printf '%s' {} > {};",
            quote(&content),
            quote_path(&file)
        ));
        fragment.echo("Compose file written: done", log_path);
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Source;

    const SPEC: &str = "services:\n  web:\n    image: nginx\n";

    fn setup() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(&dir.path().join("compose"), &dir.path().join("logs"));
        (dir, paths)
    }

    #[test]
    fn writes_file_locally() {
        let (dir, paths) = setup();
        let target = DeploymentTarget::compose("web", Source::raw(SPEC));
        let mut log = LogFile::open(&dir.path().join("logs/web.log")).unwrap();

        Raw::new(SPEC).clone_source(&target, &paths, &mut log).unwrap();

        let written =
            std::fs::read_to_string(paths.code_dir("web").join("docker-compose.yml")).unwrap();
        assert_eq!(written, SPEC);
    }

    #[test]
    fn empty_file_is_missing_artifact() {
        let (_dir, paths) = setup();
        let target = DeploymentTarget::compose("web", Source::raw("  "));

        let err = Raw::new("  ")
            .clone_command(&target, &paths, Path::new("/logs/web.log"))
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingArtifact(_)));
    }

    #[test]
    fn randomize_applies_before_writing() {
        let target = DeploymentTarget::compose("web", Source::raw(SPEC)).randomize("q9");
        let content = Raw::new(SPEC).content(&target).unwrap();
        assert!(content.contains("web-q9"));
    }

    #[test]
    fn remote_fragment_is_idempotent() {
        let (dir, paths) = setup();
        let target = DeploymentTarget::compose("web", Source::raw("services: {}\n# it's"))
            .compose_path("deploy/compose.yml");
        let log_path = dir.path().join("logs/web.log");
        std::fs::create_dir_all(log_path.parent().unwrap()).unwrap();

        let fragment = Raw::new("services: {}\n# it's")
            .clone_command(&target, &paths, &log_path)
            .unwrap();
        let script = crate::script::Script::new().push(fragment);

        for _ in 0..2 {
            let output = crate::cmd::run_shell(None, script.render()).unwrap();
            assert!(output.success(), "{}", output.stderr);
        }

        let file = paths.code_dir("web").join("deploy/compose.yml");
        assert_eq!(
            std::fs::read_to_string(file).unwrap(),
            "services: {}\n# it's"
        );
    }

    #[test]
    fn remote_and_local_writes_match() {
        let (dir, paths) = setup();
        let log_path = dir.path().join("logs/web.log");
        std::fs::create_dir_all(log_path.parent().unwrap()).unwrap();
        let local = DeploymentTarget::compose("local", Source::raw(SPEC));
        let remote = DeploymentTarget::compose("remote", Source::raw(SPEC));

        let mut log = LogFile::open(&log_path).unwrap();
        Raw::new(SPEC).clone_source(&local, &paths, &mut log).unwrap();
        let fragment = Raw::new(SPEC)
            .clone_command(&remote, &paths, &log_path)
            .unwrap();
        let output =
            crate::cmd::run_shell(None, crate::script::Script::new().push(fragment).render())
                .unwrap();
        assert!(output.success(), "{}", output.stderr);

        let read = |app: &str| {
            std::fs::read_to_string(paths.code_dir(app).join("docker-compose.yml")).unwrap()
        };
        assert_eq!(read("remote"), read("local"));
    }
}
