//! Ingress configuration aggregator.
//!
//! Walks the container inventory and folds four sources into one tree:
//! the proxy sidecar's CLI arguments, its `TRAEFIK_*` environment, the
//! provider files mounted into it, and the `traefik.`-prefixed labels of
//! every enabled workload. Merge precedence, lowest to highest:
//! file < environment < arguments < labels. Per-workload annotations are
//! authoritative over proxy-wide defaults.
//!
//! The fold is best-effort: a container whose extraction fails is logged
//! and skipped, and a malformed provider file aborts only that file.

use std::io::Read;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::merge::literal_value;
use super::model::TraefikConfig;
use crate::error::{Error, Result};
use crate::inventory::{ContainerEngine, ContainerSnapshot};

/// Label gating ingress consumption for a workload
pub const ENABLE_LABEL: &str = "traefik.enable";
/// Prefix of all ingress labels
pub const LABEL_PREFIX: &str = "traefik.";
/// Prefix of sidecar environment configuration
pub const ENV_PREFIX: &str = "TRAEFIK_";

fn port_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^http\.services\.([^.]+)\.loadbalancer\.server\.port$").unwrap()
    })
}

/// The three configuration trees extracted from one proxy sidecar
#[derive(Debug, Default)]
pub struct SidecarSources {
    /// Tree assembled from `--key.path=value` arguments
    pub args: TraefikConfig,
    /// Tree assembled from `TRAEFIK_KEY_PATH=value` environment entries
    pub envs: TraefikConfig,
    /// Tree merged from mounted provider files
    pub conf: TraefikConfig,
}

/// Extract the configuration a proxy sidecar carries in its arguments
pub fn args_config(snapshot: &ContainerSnapshot) -> Result<TraefikConfig> {
    let mut config = TraefikConfig::default();
    for arg in &snapshot.args {
        let Some(stripped) = arg.strip_prefix("--") else {
            continue;
        };
        let Some((key, value)) = stripped.split_once('=') else {
            continue;
        };
        let address: Vec<&str> = key.split('.').collect();
        config = config.set_by_address(&address, literal_value(value))?;
    }
    Ok(config)
}

/// Extract the configuration a proxy sidecar carries in its environment
pub fn envs_config(snapshot: &ContainerSnapshot) -> Result<TraefikConfig> {
    let mut config = TraefikConfig::default();
    for env in &snapshot.env {
        let Some(stripped) = env.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let Some((key, value)) = stripped.split_once('=') else {
            continue;
        };
        let address: Vec<&str> = key.split('_').collect();
        config = config.set_by_address(&address, literal_value(value))?;
    }
    Ok(config)
}

/// Extract the ingress configuration of one enabled workload's labels.
///
/// A `…loadbalancer.server.port` label synthesizes `host` and `ipaddress`
/// companions on the same service and coerces the port to an integer.
pub fn label_config(
    labels: &IndexMap<String, String>,
    host: &str,
    ipaddr: &str,
) -> Result<TraefikConfig> {
    let mut config = TraefikConfig::default();
    for (key, value) in labels {
        if key == ENABLE_LABEL {
            continue;
        }
        let Some(address_str) = key.strip_prefix(LABEL_PREFIX) else {
            continue;
        };
        if let Some(caps) = port_label_re().captures(address_str) {
            let service = &caps[1];
            config = config.set_by_address(
                &["http", "services", service, "loadbalancer", "server", "host"],
                Value::String(host.to_string()),
            )?;
            config = config.set_by_address(
                &[
                    "http",
                    "services",
                    service,
                    "loadbalancer",
                    "server",
                    "ipaddress",
                ],
                Value::String(ipaddr.to_string()),
            )?;
            let port: i64 = value
                .parse()
                .map_err(|_| Error::schema(format!("not a port number: {key}={value}")))?;
            let address: Vec<&str> = address_str.split('.').collect();
            config = config.set_by_address(&address, Value::Number(port.into()))?;
        } else {
            let address: Vec<&str> = address_str.split('.').collect();
            config = config.set_by_address(&address, literal_value(value))?;
        }
    }
    Ok(config)
}

fn parse_provider_file(name: &str, content: &[u8]) -> Result<Option<TraefikConfig>> {
    let text = |ctx: &str| {
        String::from_utf8(content.to_vec()).map_err(|e| Error::utf8(ctx.to_string(), e))
    };
    if name.ends_with(".yml") || name.ends_with(".yaml") {
        Ok(Some(TraefikConfig::from_yaml(&text(name)?)?))
    } else if name.ends_with(".toml") {
        Ok(Some(TraefikConfig::from_toml(&text(name)?)?))
    } else {
        info!("unknown format: {name}");
        Ok(None)
    }
}

fn regular_files(archive: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    let mut tar = tar::Archive::new(archive);
    let entries = tar
        .entries()
        .map_err(|e| Error::io("reading provider archive", e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::io("reading provider archive member", e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_or_else(
            |_| String::new(),
            |p| p.to_string_lossy().into_owned(),
        );
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::io("extracting provider file", e))?;
        debug!("extract {name}");
        files.push((name, content));
    }
    Ok(files)
}

/// Extract all three sidecar sources from one proxy container
pub async fn sidecar_sources<E: ContainerEngine + ?Sized>(
    engine: &E,
    snapshot: &ContainerSnapshot,
) -> Result<SidecarSources> {
    let args = args_config(snapshot)?;
    let envs = envs_config(snapshot)?;
    let mut conf = TraefikConfig::default();

    let provider = args.merge(&envs)?.providers.unwrap_or_default();
    let to_load = provider
        .file
        .as_ref()
        .and_then(|f| f.filename.clone().or_else(|| f.directory.clone()));
    if let Some(path) = to_load {
        debug!("loading provider file {path} from {}", snapshot.name);
        let (archive, _stat) = engine.get_archive(&snapshot.name, &path).await?;
        for (name, content) in regular_files(&archive)? {
            match parse_provider_file(&name, &content) {
                Ok(Some(parsed)) => conf = conf.merge(&parsed)?,
                Ok(None) => {}
                Err(e) => info!("provider file {name} skipped: {e}"),
            }
        }
    }
    Ok(SidecarSources { args, envs, conf })
}

/// Aggregate the ingress configuration of the whole inventory.
///
/// Returns the merged tree; serialization of the result omits unset
/// fields, so an inventory without ingress data yields an empty document.
pub async fn traefik_dump<E: ContainerEngine + ?Sized>(engine: &E) -> Result<TraefikConfig> {
    let containers = engine.list_containers().await?;
    aggregate(engine, &containers).await
}

/// Aggregate over an already-fetched inventory snapshot list
pub async fn aggregate<E: ContainerEngine + ?Sized>(
    engine: &E,
    containers: &[ContainerSnapshot],
) -> Result<TraefikConfig> {
    let mut from_args = TraefikConfig::default();
    let mut from_envs = TraefikConfig::default();
    let mut from_conf = TraefikConfig::default();
    let mut from_label = TraefikConfig::default();

    for snapshot in containers {
        if snapshot.is_proxy_sidecar() {
            debug!("traefik container: {}", snapshot.name);
            match sidecar_sources(engine, snapshot).await {
                Ok(sources) => {
                    from_args = from_args.merge(&sources.args)?;
                    from_envs = from_envs.merge(&sources.envs)?;
                    from_conf = from_conf.merge(&sources.conf)?;
                }
                Err(e) => warn!("skipping sidecar {}: {e}", snapshot.name),
            }
        }
        if snapshot.labels.get(ENABLE_LABEL).map(String::as_str) == Some("true") {
            debug!("traefik enabled container: {}", snapshot.name);
            let addr = snapshot.first_network_address().unwrap_or_default();
            match label_config(&snapshot.labels, &snapshot.name, addr) {
                Ok(config) => from_label = from_label.merge(&config)?,
                Err(e) => warn!("skipping labels of {}: {e}", snapshot.name),
            }
        }
    }

    from_conf
        .merge(&from_envs)?
        .merge(&from_args)?
        .merge(&from_label)
}
