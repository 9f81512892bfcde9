//! Build command generation for compose stacks and single images.
//!
//! Local builds run discrete commands through an [`Executor`] and
//! log as they go. Remote builds render the same steps as a
//! [`Fragment`] appended after the clone fragment, each step gated
//! with `exit 1`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Paths;
use crate::error::{DeployError, DeployResult};
use crate::exec::Executor;
use crate::logfile::LogFile;
use crate::registry::Registry;
use crate::script::{Fragment, abort, quote, quote_path};
use crate::target::{ComposeSpec, ComposeType, DeploymentTarget, ImageSpec, Source, TargetKind};

/// Fail with [`DeployError::MissingArtifact`] unless the target has
/// something to build: a non-empty image reference, a compose path,
/// and for raw sources a non-empty inline file.
pub fn ensure_artifact(target: &DeploymentTarget) -> DeployResult<()> {
    match &target.kind {
        TargetKind::Image(spec) if spec.image.trim().is_empty() => Err(
            DeployError::MissingArtifact(format!("docker image not set for {}", target.app_name)),
        ),
        TargetKind::Compose(spec) if spec.compose_path.trim().is_empty() => Err(
            DeployError::MissingArtifact(format!("compose path not set for {}", target.app_name)),
        ),
        TargetKind::Compose(ComposeSpec {
            source: Source::Raw { compose_file },
            ..
        }) if compose_file.trim().is_empty() => Err(DeployError::MissingArtifact(format!(
            "compose file of {} is empty",
            target.app_name
        ))),
        _ => Ok(()),
    }
}

/// Absolute path of the compose file inside the source tree.
#[must_use]
pub fn compose_file(target: &DeploymentTarget, spec: &ComposeSpec, paths: &Paths) -> PathBuf {
    paths.code_dir(&target.app_name).join(&spec.compose_path)
}

/// `docker compose up` or `docker stack deploy`, depending on the
/// compose type.
#[must_use]
pub fn compose_up_command(target: &DeploymentTarget, spec: &ComposeSpec, paths: &Paths) -> String {
    let file = quote_path(&compose_file(target, spec, paths));
    let app = quote(&target.app_name);
    match spec.compose_type {
        ComposeType::DockerCompose => {
            format!("docker compose -p {app} -f {file} up -d --build --remove-orphans")
        }
        ComposeType::Stack => {
            format!("docker stack deploy -c {file} {app} --prune --with-registry-auth")
        }
    }
}

fn compose_spec(target: &DeploymentTarget) -> DeployResult<&ComposeSpec> {
    target.compose_spec().ok_or_else(|| {
        DeployError::MissingArtifact(format!("{} has no compose specification", target.app_name))
    })
}

fn image_spec(target: &DeploymentTarget) -> DeployResult<&ImageSpec> {
    match &target.kind {
        TargetKind::Image(spec) => Ok(spec),
        TargetKind::Compose(_) => Err(DeployError::MissingArtifact(format!(
            "{} has no docker image",
            target.app_name
        ))),
    }
}

/// Remote compose build, to run after the clone fragment.
pub fn compose_fragment(
    target: &DeploymentTarget,
    paths: &Paths,
    log_path: &Path,
) -> DeployResult<Fragment> {
    ensure_artifact(target)?;
    let spec = compose_spec(target)?;
    let code_dir = paths.code_dir(&target.app_name);

    let mut fragment = Fragment::new();
    fragment.echo(&format!("==> Build {}", compose_label(spec)), log_path);
    fragment.gated(
        &format!("cd {}", quote_path(&code_dir)),
        log_path,
        &format!("ERROR: source directory {} missing", code_dir.display()),
    );
    fragment.gated(
        &compose_up_command(target, spec, paths),
        log_path,
        "ERROR: docker compose failed",
    );
    fragment.echo("Docker compose deployed: done", log_path);
    Ok(fragment)
}

/// Local compose build against an already materialized source tree.
pub fn build_compose(
    target: &DeploymentTarget,
    paths: &Paths,
    executor: &dyn Executor,
    log: &mut LogFile,
) -> DeployResult<()> {
    ensure_artifact(target)?;
    let spec = compose_spec(target)?;
    let command = compose_up_command(target, spec, paths);

    log.banner(&format!("Build {}", compose_label(spec)))?;
    log.line(&command)?;
    match executor.run(&command) {
        Ok(output) => {
            log.output(&output.stdout)?;
            log.output(&output.stderr)?;
            log.line("Docker compose deployed: done")?;
            info!(app = %target.app_name, "compose stack deployed");
            Ok(())
        }
        Err(e) => {
            if let Some(stderr) = e.stderr() {
                log.output(stderr)?;
            }
            Err(e)
        }
    }
}

const fn compose_label(spec: &ComposeSpec) -> &'static str {
    match spec.compose_type {
        ComposeType::DockerCompose => "docker-compose",
        ComposeType::Stack => "stack",
    }
}

/// Remove any previous container of the app. Never fails.
#[must_use]
pub fn remove_container_command(app_name: &str) -> String {
    format!("docker rm -f {} >/dev/null 2>&1 || true", quote(app_name))
}

/// Start the app container from its image.
#[must_use]
pub fn run_container_command(app_name: &str, spec: &ImageSpec) -> String {
    let mut command = format!(
        "docker run -d --name {} --restart unless-stopped",
        quote(app_name)
    );
    for (key, value) in &spec.env {
        command.push_str(" -e ");
        command.push_str(&quote(&format!("{key}={value}")));
    }
    for port in &spec.ports {
        command.push_str(" -p ");
        command.push_str(&quote(port));
    }
    command.push(' ');
    command.push_str(&quote(&spec.image));
    command
}

/// Remote image deployment: announce, log in (fatal on failure),
/// pull, replace the container.
///
/// The password reaches `docker login` on stdin from the shell's
/// builtin `printf`, so it never appears in a process argument
/// list on the server.
pub fn image_fragment(target: &DeploymentTarget, log_path: &Path) -> DeployResult<Fragment> {
    ensure_artifact(target)?;
    let spec = image_spec(target)?;
    let log = quote_path(log_path);
    let image = quote(&spec.image);

    let mut fragment = Fragment::new();
    fragment.echo(&format!("==> Pulling {}", spec.image), log_path);

    if let Some(auth) = &spec.credentials {
        let password = fragment.secret(&auth.password);
        fragment.line(&format!(
            "if ! printf '%s' {password} | docker login --username {} --password-stdin {} >> {log} 2>&1; then\n{}\nfi",
            quote(&auth.username),
            quote(auth.server_address()),
            abort("ERROR: registry login failed", log_path),
        ));
    }

    fragment.line(&format!(
        "docker pull {image} >> {log} 2>&1 && echo 'Pulling image completed: done' >> {log} || {{\n{}\n}}",
        abort("ERROR: pulling image failed", log_path)
    ));

    fragment.line(&format!("{};", remove_container_command(&target.app_name)));
    fragment.gated(
        &run_container_command(&target.app_name, spec),
        log_path,
        "ERROR: starting container failed",
    );
    fragment.echo("Docker deployed: done", log_path);
    Ok(fragment)
}

/// Local image deployment through the registry pull primitive.
pub fn build_image(
    target: &DeploymentTarget,
    registry: &dyn Registry,
    executor: &dyn Executor,
    log: &mut LogFile,
) -> DeployResult<()> {
    ensure_artifact(target)?;
    let spec = image_spec(target)?;

    log.banner("Build docker image")?;
    log.line(&format!("Pulling {}", spec.image))?;

    let result = registry
        .pull(&spec.image, spec.credentials.as_ref(), &mut |status: &str| {
            log.progress(status);
        })
        .and_then(|()| {
            executor.run(&remove_container_command(&target.app_name))?;
            executor.run(&run_container_command(&target.app_name, spec))
        });

    result?;
    log.line("Docker deployed: done")?;
    info!(app = %target.app_name, image = %spec.image, "container started");
    Ok(())
}

/// Stop command for a target. Stacks have no stop; image targets
/// stop their container.
#[must_use]
pub fn stop_command(target: &DeploymentTarget) -> Option<String> {
    let app = quote(&target.app_name);
    match &target.kind {
        TargetKind::Compose(spec) => match spec.compose_type {
            ComposeType::DockerCompose => Some(format!("docker compose -p {app} stop")),
            ComposeType::Stack => None,
        },
        TargetKind::Image(_) => Some(format!("docker stop {app}")),
    }
}

/// Teardown command removing everything the target runs.
#[must_use]
pub fn remove_command(target: &DeploymentTarget) -> String {
    let app = quote(&target.app_name);
    match &target.kind {
        TargetKind::Compose(spec) => match spec.compose_type {
            ComposeType::DockerCompose => format!("docker compose -p {app} down"),
            ComposeType::Stack => format!("docker stack rm {app}"),
        },
        TargetKind::Image(_) => format!("docker rm -f {app}"),
    }
}
