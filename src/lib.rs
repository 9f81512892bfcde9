//! Deployment orchestration for compose stacks and container
//! images.
//!
//! Shipwright takes a [`DeploymentTarget`], either a compose stack
//! pulled from GitHub, GitLab, Bitbucket, any git remote or an
//! inline file, or a single prebuilt image, and brings it up on
//! this host or on a remote server over SSH. Every attempt is recorded as a
//! [`Deployment`] with its own log file and exactly one terminal
//! status.
//!
//! # Overview
//!
//! A [`Pipeline`] wires together:
//!
//! - A [`StatusTracker`](status::StatusTracker) and
//!   [`DeploymentFactory`](status::DeploymentFactory) holding
//!   targets and deployment records (e.g. [`MemoryStore`])
//! - An [`ExecutorFactory`](exec::ExecutorFactory) picking local
//!   or SSH execution per target
//! - A [`Registry`](registry::Registry) pulling images for local
//!   image deployments
//! - A [`Notifier`](notify::Notifier) told about every finished
//!   deployment
//!
//! # Architecture
//!
//! An attempt moves through `created -> source-acquired -> built ->
//! done`, or to `error` from any earlier stage:
//!
//! 1. **Source** - clone the repository or write the inline compose
//!    file into `<compose_root>/<app_name>/code`
//! 2. **Build** - `docker compose up`, `docker stack deploy`, or
//!    pull and replace a single container
//! 3. **Settle** - write the terminal status and notify
//!
//! Local targets run each step as its own command. Remote targets
//! get one shell script, started with `set -e` and gated step by
//! step, sent in a single SSH round trip.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shipwright::target::{DeploymentTarget, GitRepository, Server, Source};
//! use shipwright::{MemoryStore, Pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new("/etc/shipwright/logs"));
//!     store.insert_target(
//!         DeploymentTarget::compose(
//!             "shop",
//!             Source::Github(GitRepository::new("acme/shop").token("ghp_xxx")),
//!         )
//!         .id("shop")
//!         .project("retail", "Retail")
//!         .server(Server::new("edge-1", "203.0.113.7")),
//!     )?;
//!
//!     let pipeline = Pipeline::new(store).base_url("https://deploy.example.com");
//!     let deployment = pipeline.deploy("shop", "Release 1.4", "")?;
//!     println!("{} -> {}", deployment.id, deployment.status);
//!     Ok(())
//! }
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod attempt;
pub mod build;
pub mod cli;
pub mod cmd;
pub mod compose;
pub mod config;
pub mod deployment;
pub mod error;
pub mod exec;
pub mod lock;
pub mod logfile;
pub mod logs;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod script;
pub mod source;
pub mod ssh;
pub mod status;
pub mod store;
pub mod target;

pub use deployment::{Deployment, DeploymentStatus};
pub use error::{DeployError, DeployResult};
pub use pipeline::Pipeline;
pub use store::MemoryStore;
pub use target::DeploymentTarget;
