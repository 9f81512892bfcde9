use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::error::DeployResult;
use crate::exec::SystemExecutors;
use crate::logs::LogLevel;
use crate::pipeline::Pipeline;
use crate::store::MemoryStore;
use crate::target::{DeploymentTarget, TargetStatus};

#[derive(Debug, Parser)]
#[command(name = "shipwright", version)]
#[command(about = "Deploy compose stacks and container images")]
pub struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "shipwright.yml")]
    pub config: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a target's source and deploy it
    Deploy {
        /// Target id or app name
        target: String,

        #[arg(long, default_value = "Manual deployment")]
        title: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Rebuild from the source already on disk
    Rebuild {
        target: String,

        #[arg(long, default_value = "Rebuild deployment")]
        title: String,
    },

    /// Stop a running target
    Stop { target: String },

    /// Tear down everything a target runs
    Remove { target: String },

    /// List the services of a compose target
    Services {
        target: String,

        /// Fetch the source before reading it
        #[arg(long)]
        fetch: bool,
    },

    /// Print the script a remote deploy would send, secrets masked
    Script {
        target: String,

        /// Log file path used in the script
        #[arg(long)]
        log_path: Option<PathBuf>,
    },

    /// List configured targets
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct TargetSummary<'a> {
    id: &'a str,
    app_name: &'a str,
    kind: String,
    server: Option<&'a str>,
    status: TargetStatus,
}

impl<'a> From<&'a DeploymentTarget> for TargetSummary<'a> {
    fn from(target: &'a DeploymentTarget) -> Self {
        Self {
            id: &target.id,
            app_name: &target.app_name,
            kind: target.app_type().to_string(),
            server: target.server.as_ref().map(|s| s.host.as_str()),
            status: target.status,
        }
    }
}

impl Cli {
    /// Load the configuration and dispatch the subcommand.
    pub fn run(&self) -> DeployResult<()> {
        let config = Config::load(&self.config)?;
        let store = Arc::new(MemoryStore::new(config.logs_root.clone()));
        for target in &config.targets {
            store.insert_target(target.clone())?;
        }

        let mut executors = SystemExecutors::new();
        if let Some(key) = &config.ssh_key {
            executors = executors.ssh_key(key);
        }
        let pipeline = Pipeline::new(Arc::clone(&store))
            .executors(executors)
            .paths(config.paths())
            .base_url(&config.base_url);

        match &self.command {
            Command::Deploy {
                target,
                title,
                description,
            } => {
                let target = store.resolve(target)?;
                let deployment = pipeline.deploy(&target.id, title, description)?;
                println!(
                    "{} {} ({})",
                    target.app_name,
                    deployment.status,
                    deployment.log_path.display()
                );
            }
            Command::Rebuild { target, title } => {
                let target = store.resolve(target)?;
                let deployment = pipeline.rebuild(&target.id, title, "")?;
                println!(
                    "{} {} ({})",
                    target.app_name,
                    deployment.status,
                    deployment.log_path.display()
                );
            }
            Command::Stop { target } => {
                let target = store.resolve(target)?;
                pipeline.stop(&target.id)?;
                println!("{} stopped", target.app_name);
            }
            Command::Remove { target } => {
                let target = store.resolve(target)?;
                pipeline.remove(&target.id)?;
                store.remove_target(&target.id)?;
                println!("{} removed", target.app_name);
            }
            Command::Services { target, fetch } => {
                let target = store.resolve(target)?;
                for service in pipeline.load_services(&target.id, *fetch)? {
                    println!("{service}");
                }
            }
            Command::Script { target, log_path } => {
                let target = store.resolve(target)?;
                let log_path = log_path.clone().unwrap_or_else(|| {
                    config
                        .paths()
                        .log_dir(&target.app_name)
                        .join(format!("{}.log", target.app_name))
                });
                let script = pipeline.remote_script(&target, &log_path)?;
                print!("{}", script.redacted());
            }
            Command::Status { json } => {
                let targets = store.targets();
                if *json {
                    let summaries: Vec<TargetSummary<'_>> =
                        targets.iter().map(TargetSummary::from).collect();
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else {
                    for target in &targets {
                        let summary = TargetSummary::from(target);
                        println!(
                            "{:<24} {:<12} {:<16} {:?}",
                            summary.app_name,
                            summary.kind,
                            summary.server.unwrap_or("local"),
                            summary.status
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
