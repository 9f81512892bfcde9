use std::path::Path;

use docker_compose_types::{AdvancedVolumes, Compose, DependsOnOptions, Networks, Volumes};
use indexmap::IndexMap;

use crate::error::{DeployError, DeployResult};

/// Parse a compose specification.
pub fn parse(content: &str) -> DeployResult<Compose> {
    Ok(serde_yaml::from_str(content)?)
}

/// Load and parse a compose file from disk.
pub fn load(path: &Path) -> DeployResult<Compose> {
    if !path.exists() {
        return Err(DeployError::FileNotFound(path.display().to_string()));
    }
    parse(&std::fs::read_to_string(path)?)
}

/// Render a compose specification back to YAML.
pub fn render(compose: &Compose) -> DeployResult<String> {
    Ok(serde_yaml::to_string(compose)?)
}

/// Names of the services declared in the compose file.
#[must_use]
pub fn service_names(compose: &Compose) -> Vec<String> {
    compose.services.0.keys().cloned().collect()
}

/// Append `-<suffix>` to every service, named volume and network,
/// along with the references to them, so two copies of the same
/// stack can run side by side.
#[must_use]
pub fn randomize(mut compose: Compose, suffix: &str) -> Compose {
    let rename = |name: &str| format!("{name}-{suffix}");

    let volume_names: Vec<String> = compose.volumes.0.keys().cloned().collect();
    let network_names: Vec<String> = compose.networks.0.keys().cloned().collect();
    let service_names = service_names(&compose);

    compose.volumes.0 = rename_keys(std::mem::take(&mut compose.volumes.0), &rename);
    compose.networks.0 = rename_keys(std::mem::take(&mut compose.networks.0), &rename);

    let services = std::mem::take(&mut compose.services.0);
    compose.services.0 = services
        .into_iter()
        .map(|(name, service)| {
            let service = service.map(|mut service| {
                if let Some(container) = &service.container_name {
                    service.container_name = Some(rename(container));
                }

                service.depends_on = match service.depends_on {
                    DependsOnOptions::Simple(deps) => DependsOnOptions::Simple(
                        deps.iter()
                            .map(|d| rename_if_known(d, &service_names, &rename))
                            .collect(),
                    ),
                    DependsOnOptions::Conditional(deps) => DependsOnOptions::Conditional(
                        deps.into_iter()
                            .map(|(d, cond)| (rename_if_known(&d, &service_names, &rename), cond))
                            .collect(),
                    ),
                };

                for volume in &mut service.volumes {
                    match volume {
                        Volumes::Simple(spec) => {
                            *spec = rename_volume_mount(spec, &volume_names, &rename);
                        }
                        // Only `type: volume` mounts name a declared volume.
                        Volumes::Advanced(AdvancedVolumes {
                            _type: kind,
                            source: Some(source),
                            ..
                        }) if *kind == "volume" => {
                            *source = rename_if_known(source, &volume_names, &rename);
                        }
                        Volumes::Advanced(_) => {}
                    }
                }

                match &mut service.networks {
                    Networks::Simple(nets) => {
                        for net in nets.iter_mut() {
                            *net = rename_if_known(net, &network_names, &rename);
                        }
                    }
                    Networks::Advanced(nets) => {
                        nets.0 = std::mem::take(&mut nets.0)
                            .into_iter()
                            .map(|(net, settings)| {
                                (rename_if_known(&net, &network_names, &rename), settings)
                            })
                            .collect();
                    }
                }

                service
            });
            (rename(&name), service)
        })
        .collect();

    compose
}

/// Parse, randomize and render in one go.
pub fn randomize_str(content: &str, suffix: &str) -> DeployResult<String> {
    render(&randomize(parse(content)?, suffix))
}

/// Randomize a compose file in place.
pub fn randomize_file(path: &Path, suffix: &str) -> DeployResult<()> {
    let compose = randomize(load(path)?, suffix);
    std::fs::write(path, render(&compose)?)?;
    Ok(())
}

fn rename_keys<V>(map: IndexMap<String, V>, rename: &impl Fn(&str) -> String) -> IndexMap<String, V> {
    map.into_iter().map(|(k, v)| (rename(&k), v)).collect()
}

fn rename_if_known(name: &str, known: &[String], rename: &impl Fn(&str) -> String) -> String {
    if known.iter().any(|k| k == name) {
        rename(name)
    } else {
        name.to_string()
    }
}

/// `data:/var/lib/data:ro` -> `data-x:/var/lib/data:ro` when
/// `data` is a declared named volume. Bind mounts are untouched.
fn rename_volume_mount(
    spec: &str,
    volume_names: &[String],
    rename: &impl Fn(&str) -> String,
) -> String {
    match spec.split_once(':') {
        Some((source, rest)) if volume_names.iter().any(|v| v == source) => {
            format!("{}:{rest}", rename(source))
        }
        _ => spec.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r"
services:
  web:
    image: nginx
    container_name: web
    depends_on:
      - db
    volumes:
      - static:/usr/share/nginx/html:ro
      - ./conf:/etc/nginx/conf.d
    networks:
      - front
  db:
    image: postgres
    volumes:
      - pgdata:/var/lib/postgresql/data
volumes:
  static:
  pgdata:
networks:
  front:
";

    #[test]
    fn lists_services_in_order() {
        let compose = parse(STACK).unwrap();
        assert_eq!(service_names(&compose), vec!["web", "db"]);
    }

    #[test]
    fn randomize_suffixes_names_and_references() {
        let compose = randomize(parse(STACK).unwrap(), "x1");

        assert_eq!(service_names(&compose), vec!["web-x1", "db-x1"]);
        assert!(compose.volumes.0.contains_key("static-x1"));
        assert!(compose.volumes.0.contains_key("pgdata-x1"));
        assert!(compose.networks.0.contains_key("front-x1"));

        let web = compose.services.0["web-x1"].as_ref().unwrap();
        assert_eq!(web.container_name.as_deref(), Some("web-x1"));
        assert!(matches!(
            &web.depends_on,
            DependsOnOptions::Simple(deps) if deps == &vec!["db-x1".to_string()]
        ));

        let rendered = render(&compose).unwrap();
        assert!(rendered.contains("static-x1:/usr/share/nginx/html:ro"));
        assert!(rendered.contains("./conf:/etc/nginx/conf.d"));
        assert!(rendered.contains("pgdata-x1:/var/lib/postgresql/data"));
        assert!(rendered.contains("front-x1"));
    }

    #[test]
    fn randomize_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, STACK).unwrap();

        randomize_file(&path, "abc").unwrap();

        let compose = load(&path).unwrap();
        assert_eq!(service_names(&compose), vec!["web-abc", "db-abc"]);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            parse("services: [unclosed"),
            Err(DeployError::Yaml(_))
        ));
    }
}
