//! # docker-recon
//!
//! Reconstruct declarative infrastructure artifacts from the observed
//! state of a running container engine: compose documents, merged Traefik
//! configuration trees, rendered nginx/Apache reverse-proxy configs, and
//! Dockerfiles replaying a container's filesystem delta.
//!
//! The crate observes and reports; it never mutates the cluster.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docker_recon::{compose, traefik, ComposeOptions, DockerCli, EmitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docker_recon::Error> {
//!     let engine = DockerCli::new()?;
//!
//!     // Rebuild a compose document from the running containers
//!     let document = compose::compose(&engine, &ComposeOptions::default()).await?;
//!     println!("{}", serde_yaml::to_string(&document).unwrap());
//!
//!     // Aggregate the ingress configuration and render it for nginx
//!     let config = traefik::traefik_dump(&engine).await?;
//!     let text = traefik::traefik_to_nginx(&config, &EmitOptions::default())?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`inventory`] - container engine adapter and immutable snapshots
//! - [`traefik`] - ingress aggregation, model, and proxy emitters
//! - [`compose`] - compose document reconstruction
//! - [`dockerfile`] - image delta classification and artifact generation
//! - [`volume`] - volume reporting and tarring
//! - [`report`] - label and attribute reports
//! - [`monitor`] - proxy supervisor loop
//! - [`output`] - multi-format serialization and subpath lookup
//! - [`executor`] - low-level process execution
//! - [`error`] - error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub use compose::{ComposeDocument, ComposeOptions, ComposeService, PortEntry};
pub use dockerfile::{Artifact, ArtifactTarStream, DeltaSummary, DockerfileOptions};
pub use error::{Error, Result};
pub use inventory::{
    ContainerEngine, ContainerSnapshot, DiffEntry, DiffKind, DockerCli, EphemeralMount,
    HostConfig, PathStat, VolumeInfo,
};
pub use monitor::{MonitorOptions, MonitorState, MonitorStopHandle, ProxyDialect, ProxyMonitor};
pub use output::{resolve_pointer, Format};
pub use traefik::{EmitOptions, TraefikConfig};
pub use volume::TarVolumeOptions;

pub mod compose;
pub mod dockerfile;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod monitor;
pub mod output;
pub mod report;
pub mod traefik;
pub mod volume;
