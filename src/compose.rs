//! Compose document reconstruction.
//!
//! Diffs each container's runtime state against its image baseline and
//! emits the minimal compose document that would recreate the observed
//! workload: labels and environment entries that merely restate the image
//! are dropped, binds under the project working directory are rewritten to
//! `./` form, named volumes and networks are declared at the top level,
//! and resource caps are copied through a fixed key table.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::inventory::{ContainerEngine, ContainerSnapshot, PortBinding};

/// Host-config keys copied verbatim into a service when non-empty
const HOSTCONFIG_KEYS: &[(&str, &str)] = &[
    ("ExtraHosts", "extra_hosts"),
    ("CpuShares", "cpu_shares"),
    ("CpuPeriod", "cpu_period"),
    ("CpuPercent", "cpu_percent"),
    ("CpuCount", "cpu_count"),
    ("CpuQuota", "cpu_quota"),
    ("CpuRealtimeRuntime", "cpu_rt_runtime"),
    ("CpuRealtimePeriod", "cpu_rt_period"),
    ("CpusetCpus", "cpuset"),
    ("CapAdd", "cap_add"),
    ("CapDrop", "cap_drop"),
    ("CgroupParent", "cgroup_parent"),
    ("GroupAdd", "group_add"),
    ("Privileged", "privileged"),
];

/// Labels remapped into service keys instead of being dropped
const LABEL_KEYS: &[(&str, &str)] = &[("com.docker.compose.depends_on", "depends_on")];

/// Options of a compose reconstruction pass
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Include containers without a compose project annotation
    pub all: bool,
    /// Shell glob selecting projects
    pub project: String,
    /// Extract the contents of `./`-relative binds (needs `output`)
    pub volume: bool,
    /// Directory receiving `compose.yml` and extracted bind contents
    pub output: Option<PathBuf>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            all: false,
            project: "*".to_string(),
            volume: true,
            output: None,
        }
    }
}

/// A published port, short string form or long object form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortEntry {
    /// `host:container` shorthand, tcp only
    Short(String),
    /// Long form used for non-tcp or multi-bound ports
    Long {
        /// Container port
        target: i64,
        /// Host port as reported by the engine
        #[serde(skip_serializing_if = "Option::is_none")]
        published: Option<String>,
        /// Port protocol
        protocol: String,
        /// Publish mode
        mode: String,
    },
}

/// One reconstructed compose service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeService {
    /// Image reference
    pub image: String,
    /// Container name, when it does not follow the project convention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Propagated network mode (host, none, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Bind and volume attachments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Named network attachments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Published ports
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortEntry>,
    /// Restart policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// Labels not already carried by the image
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    /// Environment not already carried by the image
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    /// Table-copied keys: resource caps, depends_on, command, entrypoint
    #[serde(flatten, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

/// A reconstructed compose document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeDocument {
    /// Services by name
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub services: IndexMap<String, ComposeService>,
    /// Named volumes with their driver options
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub volumes: IndexMap<String, Value>,
    /// Named networks
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub networks: IndexMap<String, Value>,
}

/// Split KEY=VALUE entries into a map, dropping malformed entries
#[must_use]
pub fn envlist_to_map(env: &[String]) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for entry in env {
        if let Some((key, value)) = entry.split_once('=') {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Render engine port bindings in compose form
#[must_use]
pub fn ports_to_compose(bindings: &IndexMap<String, Vec<PortBinding>>) -> Vec<PortEntry> {
    let mut ports = Vec::new();
    for (port, bound) in bindings {
        if port.ends_with("/tcp") && bound.len() == 1 {
            let container_port = port.split('/').next().unwrap_or(port);
            let host_port = bound[0].host_port.clone().unwrap_or_default();
            match &bound[0].host_ip {
                Some(ip) => ports.push(PortEntry::Short(format!("{ip}:{host_port}:{container_port}"))),
                None => ports.push(PortEntry::Short(format!("{host_port}:{container_port}"))),
            }
        } else {
            let (target, protocol) = port.split_once('/').unwrap_or((port.as_str(), "tcp"));
            ports.push(PortEntry::Long {
                target: target.parse().unwrap_or_default(),
                published: bound.first().and_then(|b| b.host_port.clone()),
                protocol: protocol.to_string(),
                mode: "host".to_string(),
            });
        }
    }
    ports
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn rewrite_bind_source(source: &str, working_dir: &str) -> String {
    if let Ok(relative) = Path::new(source).strip_prefix(working_dir) {
        if Path::new(source).is_absolute() {
            return format!("./{}", relative.display());
        }
    }
    source.to_string()
}

async fn copy_bind_contents<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &str,
    container_path: &str,
    destination: &Path,
) -> Result<()> {
    info!("copy {container}:{container_path} -> {}", destination.display());
    let (bytes, _stat) = engine.get_archive(container, container_path).await?;
    let mut member_count = 0;
    let mut first_is_file = false;
    let mut archive = tar::Archive::new(bytes.as_slice());
    for (index, entry) in archive
        .entries()
        .map_err(|e| Error::io("reading bind archive", e))?
        .enumerate()
    {
        let entry = entry.map_err(|e| Error::io("reading bind archive member", e))?;
        if index == 0 {
            first_is_file = entry.header().entry_type().is_file();
        }
        member_count += 1;
    }

    // single regular file: the destination is the file itself
    if member_count == 1 && first_is_file {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating bind output directory", e))?;
        }
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive
            .entries()
            .map_err(|e| Error::io("reading bind archive", e))?
            .next()
            .transpose()
            .map_err(|e| Error::io("reading bind archive member", e))?;
        if let Some(mut entry) = entry {
            entry
                .unpack(destination)
                .map_err(|e| Error::io("extracting bind file", e))?;
        }
        return Ok(());
    }

    std::fs::create_dir_all(destination)
        .map_err(|e| Error::io("creating bind output directory", e))?;
    let mut archive = tar::Archive::new(bytes.as_slice());
    for entry in archive
        .entries()
        .map_err(|e| Error::io("reading bind archive", e))?
    {
        let mut entry = entry.map_err(|e| Error::io("reading bind archive member", e))?;
        let path = entry
            .path()
            .map_err(|e| Error::io("reading bind archive member path", e))?
            .into_owned();
        // drop the archive's root component so members land in destination
        let mut components = path.components();
        components.next();
        let remainder = components.as_path();
        if remainder.as_os_str().is_empty() {
            continue;
        }
        let target = destination.join(remainder);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| Error::io("creating bind output directory", e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::io("creating bind output directory", e))?;
            }
            entry
                .unpack(&target)
                .map_err(|e| Error::io("extracting bind member", e))?;
        }
    }
    Ok(())
}

/// Reconstruct a compose document from the running inventory
pub async fn compose<E: ContainerEngine + ?Sized>(
    engine: &E,
    options: &ComposeOptions,
) -> Result<ComposeDocument> {
    let containers = engine.list_containers().await?;
    compose_containers(engine, &containers, options).await
}

/// Reconstruct a compose document from an already-fetched inventory
pub async fn compose_containers<E: ContainerEngine + ?Sized>(
    engine: &E,
    containers: &[ContainerSnapshot],
    options: &ComposeOptions,
) -> Result<ComposeDocument> {
    let pattern = glob::Pattern::new(&options.project)
        .map_err(|e| Error::parse("project pattern", e.to_string()))?;
    let mut services = IndexMap::new();
    let mut volumes = IndexMap::new();
    let mut networks = IndexMap::new();

    for snapshot in containers {
        let project = snapshot.compose_project().map(String::from);
        if !options.all && project.is_none() {
            debug!("skip: no project annotation: {}", snapshot.name);
            continue;
        }
        if !options.all {
            if let Some(project) = &project {
                if !pattern.matches(project) {
                    debug!("skip by project ({project})");
                    continue;
                }
            }
        }
        let name = snapshot.compose_service().to_string();
        info!("processing {}, service={name}", snapshot.name);
        let working_dir = snapshot.compose_working_dir().to_string();

        let mut labels = snapshot.labels.clone();
        for (key, value) in &snapshot.image_labels {
            if labels.get(key) == Some(value) {
                labels.shift_remove(key);
            }
        }
        labels.retain(|key, _| !key.starts_with("com.docker.compose."));

        let mut environment = envlist_to_map(&snapshot.env);
        let image_env = envlist_to_map(&snapshot.image_env);
        for (key, value) in &image_env {
            if environment.get(key) == Some(value) {
                environment.shift_remove(key);
            }
        }

        let host = &snapshot.host_config;
        let mut service_volumes = Vec::new();
        for bind in &host.binds {
            let parts: Vec<&str> = bind.splitn(3, ':').collect();
            if parts.len() < 2 {
                continue;
            }
            let (raw_source, target) = (parts[0], parts[1]);
            if snapshot.image_volumes.iter().any(|v| v == target) {
                continue;
            }
            let source = rewrite_bind_source(raw_source, &working_dir);
            match parts.get(2) {
                None | Some(&"rw") => service_volumes.push(format!("{source}:{target}")),
                Some(mode) => service_volumes.push(format!("{source}:{target}:{mode}")),
            }
            if let Some(output) = &options.output {
                if options.volume && source.starts_with("./") {
                    copy_bind_contents(engine, &snapshot.name, target, &output.join(&source))
                        .await?;
                } else {
                    info!("skip copy: {name}:{target} -> {source}");
                }
            }
        }

        for mount in &host.mounts {
            if snapshot.image_volumes.iter().any(|v| *v == mount.target) {
                continue;
            }
            let mut volume_name = mount.source.clone();
            if let Some(project) = &project {
                if let Some(stripped) = volume_name.strip_prefix(&format!("{project}_")) {
                    volume_name = stripped.to_string();
                }
            }
            if mount.mount_type == "volume" {
                volumes.insert(
                    volume_name.clone(),
                    mount
                        .volume_options
                        .clone()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                );
            }
            if !mount.target.is_empty() {
                service_volumes.push(format!("{volume_name}:{}", mount.target));
            }
        }

        let implicit_network = project.as_ref().map(|p| format!("{p}_default"));
        let mut network_mode = None;
        if project.is_none() || host.network_mode != implicit_network {
            network_mode = host.network_mode.clone();
        }
        let mut service_networks = Vec::new();
        if let Some(mode) = &network_mode {
            if mode != "host" && mode != "none" {
                networks.insert(mode.clone(), Value::Object(Default::default()));
                service_networks.push(mode.clone());
                network_mode = None;
            }
        }

        let mut service = ComposeService {
            image: snapshot.image.clone(),
            ..Default::default()
        };
        if let Some(project) = &project {
            if !snapshot.name.starts_with(&format!("{project}_")) {
                service.container_name = Some(snapshot.name.clone());
            }
        }
        service.network_mode = network_mode;
        service.volumes = service_volumes;
        service.networks = service_networks;
        if !host.port_bindings.is_empty() {
            service.ports = ports_to_compose(&host.port_bindings);
        }
        if let Some(policy) = &host.restart_policy {
            if policy != "no" {
                service.restart = Some(policy.clone());
            }
        }
        service.labels = labels;
        service.environment = environment;

        for (from, to) in HOSTCONFIG_KEYS {
            if let Some(value) = host.raw.get(*from) {
                if truthy(value) {
                    service.extra.insert((*to).to_string(), value.clone());
                }
            }
        }
        for (from, to) in LABEL_KEYS {
            if let Some(value) = snapshot.labels.get(*from) {
                if !value.is_empty() {
                    service
                        .extra
                        .insert((*to).to_string(), Value::String(value.clone()));
                }
            }
        }
        if let Some(cmd) = &snapshot.cmd {
            if snapshot.image_cmd.as_ref() != Some(cmd) {
                service.extra.insert("command".to_string(), cmd.clone());
            }
        }
        if let Some(entrypoint) = &snapshot.entrypoint {
            if snapshot.image_entrypoint.as_ref() != Some(entrypoint) {
                service
                    .extra
                    .insert("entrypoint".to_string(), entrypoint.clone());
            }
        }

        services.insert(name, service);
    }

    let document = ComposeDocument {
        services,
        volumes,
        networks,
    };
    if let Some(output) = &options.output {
        let text = serde_yaml::to_string(&document)
            .map_err(|e| Error::yaml("compose document", e))?;
        std::fs::write(output.join("compose.yml"), text)
            .map_err(|e| Error::io("writing compose.yml", e))?;
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envlist_to_map_splits_once() {
        let map = envlist_to_map(&[
            "A=1".to_string(),
            "B=x=y".to_string(),
            "malformed".to_string(),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["A"], "1");
        assert_eq!(map["B"], "x=y");
    }

    #[test]
    fn test_ports_short_form_tcp() {
        let mut bindings = IndexMap::new();
        bindings.insert(
            "8080/tcp".to_string(),
            vec![PortBinding {
                host_ip: None,
                host_port: Some("8080".to_string()),
            }],
        );
        assert_eq!(
            ports_to_compose(&bindings),
            vec![PortEntry::Short("8080:8080".to_string())]
        );
    }

    #[test]
    fn test_ports_short_form_with_host_ip() {
        let mut bindings = IndexMap::new();
        bindings.insert(
            "8888/tcp".to_string(),
            vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some("8888".to_string()),
            }],
        );
        assert_eq!(
            ports_to_compose(&bindings),
            vec![PortEntry::Short("127.0.0.1:8888:8888".to_string())]
        );
    }

    #[test]
    fn test_ports_long_form_udp() {
        let mut bindings = IndexMap::new();
        bindings.insert(
            "443/udp".to_string(),
            vec![PortBinding {
                host_ip: None,
                host_port: Some("443".to_string()),
            }],
        );
        assert_eq!(
            ports_to_compose(&bindings),
            vec![PortEntry::Long {
                target: 443,
                published: Some("443".to_string()),
                protocol: "udp".to_string(),
                mode: "host".to_string(),
            }]
        );
    }

    #[test]
    fn test_rewrite_bind_source() {
        assert_eq!(rewrite_bind_source("/home/dir/data", "/home/dir"), "./data");
        assert_eq!(rewrite_bind_source("/elsewhere/data", "/home/dir"), "/elsewhere/data");
        assert_eq!(rewrite_bind_source("namedvol", "/home/dir"), "namedvol");
    }

    #[test]
    fn test_truthy() {
        use serde_json::json;
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!(["a"])));
        assert!(truthy(&json!(512)));
        assert!(truthy(&json!(true)));
    }

    #[test]
    fn test_port_entry_serialization() {
        let short = serde_yaml::to_string(&PortEntry::Short("80:80".to_string())).unwrap();
        assert_eq!(short.trim(), "80:80");
        let long = PortEntry::Long {
            target: 443,
            published: Some("443".to_string()),
            protocol: "udp".to_string(),
            mode: "host".to_string(),
        };
        let text = serde_yaml::to_string(&long).unwrap();
        assert!(text.contains("target: 443"));
        assert!(text.contains("protocol: udp"));
        assert!(text.contains("mode: host"));
    }
}
