//! Ingress configuration subsystem.
//!
//! Aggregates a Traefik-shaped configuration tree from four container
//! sources (CLI arguments, environment, mounted provider files, workload
//! labels) and compiles the merged tree into nginx or Apache reverse-proxy
//! configuration.

pub mod aggregate;
pub mod apache;
pub mod merge;
pub mod model;
pub mod nginx;
pub mod rule;

pub use aggregate::traefik_dump;
pub use apache::traefik_to_apache;
pub use model::TraefikConfig;
pub use nginx::traefik_to_nginx;

use std::path::Path;

use crate::error::{Error, Result};

/// Options shared by both proxy dialect emitters
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// User-supplied base configuration text; a minimal built-in template
    /// is used when absent
    pub base_conf: Option<String>,
    /// Listener URL deciding the emitted host and port
    pub server_url: String,
    /// Use `server.ipaddress` instead of `server.host` as the backend
    /// authority
    pub ipaddr: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            base_conf: None,
            server_url: "http://localhost/".to_string(),
            ipaddr: false,
        }
    }
}

/// Load a configuration tree from a YAML or TOML file on disk.
///
/// Strict mode additionally rejects keys outside the recognized schema.
pub fn load_file(path: &Path, strict: bool) -> Result<TraefikConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    let value: serde_json::Value = if path.extension().is_some_and(|e| e == "toml") {
        toml::from_str(&text).map_err(|e| Error::toml(path.display().to_string(), e.to_string()))?
    } else {
        serde_yaml::from_str(&text).map_err(|e| Error::yaml(path.display().to_string(), e))?
    };
    if strict {
        TraefikConfig::validate_strict(value)
    } else {
        TraefikConfig::validate(value)
    }
}
