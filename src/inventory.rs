//! Container inventory adapter.
//!
//! Abstracts the container engine behind the [`ContainerEngine`] trait:
//! list containers, fetch path archives with stat information, diff a
//! container filesystem against its image, and manage the ephemeral
//! containers used for volume tarring. [`DockerCli`] implements the trait
//! by driving the `docker` binary.
//!
//! A [`ContainerSnapshot`] is the immutable view of one container used by
//! every downstream pass; it joins the container's inspect document with
//! its image's so that reconstruction can diff the two.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::executor::ProcessExecutor;

/// Directory bit of the engine's file-mode encoding (Go `io/fs.ModeDir`)
pub const MODE_DIR: u32 = 1 << 31;
/// Symlink bit
pub const MODE_SYMLINK: u32 = 1 << 27;
/// Device bit
pub const MODE_DEVICE: u32 = 1 << 26;
/// Named-pipe bit
pub const MODE_NAMEDPIPE: u32 = 1 << 25;
/// Socket bit
pub const MODE_SOCKET: u32 = 1 << 24;
/// Setuid bit
pub const MODE_SETUID: u32 = 1 << 23;
/// Setgid bit
pub const MODE_SETGID: u32 = 1 << 22;
/// Character-device bit
pub const MODE_CHARDEV: u32 = 1 << 21;
/// Sticky bit
pub const MODE_STICKY: u32 = 1 << 20;
/// Irregular-file bit
pub const MODE_IRREGULAR: u32 = 1 << 19;

/// Bits whose presence makes a path "non-regular" for delta purposes
const NON_REGULAR: u32 =
    MODE_DIR | MODE_DEVICE | MODE_NAMEDPIPE | MODE_SOCKET | MODE_CHARDEV | MODE_IRREGULAR;

/// Stat of a path inside a container, in the engine's mode encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStat {
    /// Mode bits (type flags in the high bits, unix permissions in the low 9)
    pub mode: u32,
    /// Symlink target, when the path is a symlink
    pub link_target: Option<String>,
}

impl PathStat {
    /// Stat of a regular file with the given permissions
    #[must_use]
    pub fn regular(perm: u32) -> Self {
        Self {
            mode: perm & 0o777,
            link_target: None,
        }
    }

    /// Whether the directory bit is set
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    /// Whether the symlink bit is set
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.mode & MODE_SYMLINK != 0
    }

    /// Whether any non-regular type bit is set (directories included)
    #[must_use]
    pub fn is_non_regular(&self) -> bool {
        self.mode & NON_REGULAR != 0
    }

    /// The unix permission bits
    #[must_use]
    pub fn perm(&self) -> u32 {
        self.mode & 0o777
    }
}

/// Kind of a filesystem diff entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// File or directory content changed (engine code 0)
    Modified,
    /// Path was added (engine code 1)
    Added,
    /// Path was deleted (engine code 2)
    Deleted,
}

impl DiffKind {
    /// Map an engine kind code to a diff kind
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Modified),
            1 => Some(Self::Added),
            2 => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One entry of a container filesystem diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Absolute path inside the container
    pub path: String,
    /// What happened to the path
    pub kind: DiffKind,
}

/// Parse `docker diff` output lines ("C /path", "A /path", "D /path")
#[must_use]
pub fn parse_diff_output(stdout: &str) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.len() < 3 {
            continue;
        }
        let kind = match line.chars().next() {
            Some('C') => DiffKind::Modified,
            Some('A') => DiffKind::Added,
            Some('D') => DiffKind::Deleted,
            _ => continue,
        };
        entries.push(DiffEntry {
            path: line[2..].to_string(),
            kind,
        });
    }
    entries
}

/// One host port binding of a published container port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortBinding {
    /// Host interface address, empty or absent for all interfaces
    pub host_ip: Option<String>,
    /// Host port as reported by the engine
    pub host_port: Option<String>,
}

/// A mount of the container's host configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MountSpec {
    /// Mount type ("volume", "bind", ...)
    pub mount_type: String,
    /// Source volume name or host path
    pub source: String,
    /// Target path inside the container
    pub target: String,
    /// Volume driver options, verbatim
    pub volume_options: Option<Value>,
}

/// The runtime host configuration of a container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConfig {
    /// Bind specifications ("src:dst" or "src:dst:mode")
    pub binds: Vec<String>,
    /// Structured mounts
    pub mounts: Vec<MountSpec>,
    /// Published ports: "port/proto" to its host bindings
    pub port_bindings: IndexMap<String, Vec<PortBinding>>,
    /// Network mode, when set
    pub network_mode: Option<String>,
    /// Restart policy name, when set
    pub restart_policy: Option<String>,
    /// The raw host-config document, for key-table copies
    pub raw: serde_json::Map<String, Value>,
}

impl HostConfig {
    /// Extract the interesting pieces of an engine host-config document
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let raw = value.as_object().cloned().unwrap_or_default();
        let binds = string_list(value.get("Binds"));
        let mut mounts = Vec::new();
        if let Some(items) = value.get("Mounts").and_then(Value::as_array) {
            for m in items {
                mounts.push(MountSpec {
                    mount_type: str_field(m, "Type"),
                    source: str_field(m, "Source"),
                    target: str_field(m, "Target"),
                    volume_options: m.get("VolumeOptions").filter(|v| !v.is_null()).cloned(),
                });
            }
        }
        let mut port_bindings = IndexMap::new();
        if let Some(map) = value.get("PortBindings").and_then(Value::as_object) {
            for (port, bindings) in map {
                let parsed = bindings
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|b| PortBinding {
                                host_ip: opt_str_field(b, "HostIp"),
                                host_port: opt_str_field(b, "HostPort"),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                port_bindings.insert(port.clone(), parsed);
            }
        }
        Self {
            binds,
            mounts,
            port_bindings,
            network_mode: value
                .get("NetworkMode")
                .and_then(Value::as_str)
                .map(String::from),
            restart_policy: value
                .get("RestartPolicy")
                .and_then(|p| p.get("Name"))
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .map(String::from),
            raw,
        }
    }
}

/// Immutable view of one container for a single pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSnapshot {
    /// Container id
    pub id: String,
    /// Container name without the leading slash
    pub name: String,
    /// Image reference from the container configuration
    pub image: String,
    /// Image tags, first tag is authoritative for sidecar detection
    pub image_tags: Vec<String>,
    /// Effective container labels
    pub labels: IndexMap<String, String>,
    /// Environment entries, KEY=VALUE
    pub env: Vec<String>,
    /// Command arguments (argv after the entrypoint)
    pub args: Vec<String>,
    /// Container command, verbatim
    pub cmd: Option<Value>,
    /// Container entrypoint, verbatim
    pub entrypoint: Option<Value>,
    /// Labels baked into the image
    pub image_labels: IndexMap<String, String>,
    /// Environment baked into the image
    pub image_env: Vec<String>,
    /// Volume paths declared by the image
    pub image_volumes: Vec<String>,
    /// Image command, verbatim
    pub image_cmd: Option<Value>,
    /// Image entrypoint, verbatim
    pub image_entrypoint: Option<Value>,
    /// Runtime host configuration
    pub host_config: HostConfig,
    /// Network attachments: network name to assigned address
    pub networks: IndexMap<String, String>,
    /// The full inspect document, for raw reporting
    pub raw: Value,
}

impl ContainerSnapshot {
    /// Build a snapshot from an inspect document and its image's
    #[must_use]
    pub fn from_inspect(container: &Value, image: Option<&Value>) -> Self {
        let config = container.get("Config").cloned().unwrap_or(Value::Null);
        let image_config = image
            .and_then(|i| i.get("Config"))
            .cloned()
            .unwrap_or(Value::Null);
        let mut networks = IndexMap::new();
        if let Some(map) = container
            .get("NetworkSettings")
            .and_then(|n| n.get("Networks"))
            .and_then(Value::as_object)
        {
            for (name, net) in map {
                networks.insert(name.clone(), str_field(net, "IPAddress"));
            }
        }
        Self {
            id: str_field(container, "Id"),
            name: str_field(container, "Name")
                .trim_start_matches('/')
                .to_string(),
            image: str_field(&config, "Image"),
            image_tags: string_list(image.and_then(|i| i.get("RepoTags"))),
            labels: string_map(config.get("Labels")),
            env: string_list(config.get("Env")),
            args: string_list(container.get("Args")),
            cmd: config.get("Cmd").filter(|v| !v.is_null()).cloned(),
            entrypoint: config.get("Entrypoint").filter(|v| !v.is_null()).cloned(),
            image_labels: string_map(image_config.get("Labels")),
            image_env: string_list(image_config.get("Env")),
            image_volumes: image_config
                .get("Volumes")
                .and_then(Value::as_object)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default(),
            image_cmd: image_config.get("Cmd").filter(|v| !v.is_null()).cloned(),
            image_entrypoint: image_config
                .get("Entrypoint")
                .filter(|v| !v.is_null())
                .cloned(),
            host_config: container
                .get("HostConfig")
                .map(HostConfig::from_value)
                .unwrap_or_default(),
            networks,
            raw: container.clone(),
        }
    }

    /// The compose project annotation, if present
    #[must_use]
    pub fn compose_project(&self) -> Option<&str> {
        self.labels
            .get("com.docker.compose.project")
            .map(String::as_str)
    }

    /// The compose service annotation, falling back to the container name
    #[must_use]
    pub fn compose_service(&self) -> &str {
        self.labels
            .get("com.docker.compose.service")
            .map_or(self.name.as_str(), String::as_str)
    }

    /// The compose working directory annotation, defaulting to `/`
    #[must_use]
    pub fn compose_working_dir(&self) -> &str {
        self.labels
            .get("com.docker.compose.project.working_dir")
            .map_or("/", String::as_str)
    }

    /// Address of the first network attachment, if any
    #[must_use]
    pub fn first_network_address(&self) -> Option<&str> {
        self.networks.values().next().map(String::as_str)
    }

    /// Whether this container looks like a Traefik proxy sidecar
    #[must_use]
    pub fn is_proxy_sidecar(&self) -> bool {
        self.image_tags
            .first()
            .is_some_and(|tag| tag.contains("traefik"))
    }
}

/// Engine volume attributes
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInfo {
    /// Volume name (also its id for the local driver)
    pub name: String,
    /// The full inspect document
    pub raw: Value,
}

/// A read-only volume mount for an ephemeral container
#[derive(Debug, Clone)]
pub struct EphemeralMount {
    /// Source volume name
    pub source: String,
    /// Target path inside the container
    pub target: String,
}

/// Capability set every supported container engine must expose
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List running containers as snapshots
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>>;

    /// Fetch a single container snapshot by name or id
    async fn get_container(&self, name_or_id: &str) -> Result<ContainerSnapshot>;

    /// Fetch a tar archive of a path plus its stat
    async fn get_archive(&self, container: &str, path: &str) -> Result<(Vec<u8>, PathStat)>;

    /// Diff the container filesystem against its image
    async fn diff(&self, container: &str) -> Result<Vec<DiffEntry>>;

    /// List volumes
    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>>;

    /// Look up one volume
    async fn get_volume(&self, name: &str) -> Result<VolumeInfo>;

    /// Ensure an image is available locally, pulling when absent
    async fn pull_or_get_image(&self, reference: &str) -> Result<String>;

    /// Create a stopped container with read-only volume mounts
    async fn create_ephemeral(&self, image: &str, mounts: &[EphemeralMount]) -> Result<String>;

    /// Force-remove a container
    async fn remove_container(&self, id: &str) -> Result<()>;
}

/// [`ContainerEngine`] implementation driving the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    executor: ProcessExecutor,
}

impl DockerCli {
    /// Create a client for the docker binary found on the system
    pub fn new() -> Result<Self> {
        Ok(Self {
            executor: ProcessExecutor::docker()?,
        })
    }

    /// Create a client around an existing executor
    #[must_use]
    pub fn with_executor(executor: ProcessExecutor) -> Self {
        Self { executor }
    }

    async fn inspect_many(&self, kind: Option<&str>, ids: &[String]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["inspect".to_string()];
        if let Some(kind) = kind {
            args.push("--type".to_string());
            args.push(kind.to_string());
        }
        args.extend(ids.iter().cloned());
        let stdout = self.executor.execute_text(&args).await?;
        serde_json::from_str(&stdout).map_err(|e| Error::json("inspect output", e))
    }

    async fn snapshots_for(&self, ids: &[String]) -> Result<Vec<ContainerSnapshot>> {
        let docs = self.inspect_many(Some("container"), ids).await?;
        let image_ids: Vec<String> = {
            let mut seen = Vec::new();
            for doc in &docs {
                let id = str_field(doc, "Image");
                if !id.is_empty() && !seen.contains(&id) {
                    seen.push(id);
                }
            }
            seen
        };
        let image_docs = self.inspect_many(Some("image"), &image_ids).await?;
        let snapshots = docs
            .iter()
            .map(|doc| {
                let image_id = str_field(doc, "Image");
                let image = image_docs.iter().find(|i| str_field(i, "Id") == image_id);
                ContainerSnapshot::from_inspect(doc, image)
            })
            .collect();
        Ok(snapshots)
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>> {
        let stdout = self
            .executor
            .execute_text(&["ps".to_string(), "-q".to_string()])
            .await?;
        let ids: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        self.snapshots_for(&ids).await
    }

    async fn get_container(&self, name_or_id: &str) -> Result<ContainerSnapshot> {
        let snapshots = self.snapshots_for(&[name_or_id.to_string()]).await?;
        snapshots
            .into_iter()
            .next()
            .ok_or_else(|| Error::inventory(format!("container not found: {name_or_id}")))
    }

    async fn get_archive(&self, container: &str, path: &str) -> Result<(Vec<u8>, PathStat)> {
        let args = vec![
            "cp".to_string(),
            format!("{container}:{path}"),
            "-".to_string(),
        ];
        let output = self.executor.execute(&args).await?;
        let stat = stat_from_tar(&output.stdout)
            .ok_or_else(|| Error::inventory(format!("empty archive for {container}:{path}")))?;
        debug!("archive {container}:{path} mode={:o}", stat.mode);
        Ok((output.stdout, stat))
    }

    async fn diff(&self, container: &str) -> Result<Vec<DiffEntry>> {
        let stdout = self
            .executor
            .execute_text(&["diff".to_string(), container.to_string()])
            .await?;
        Ok(parse_diff_output(&stdout))
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>> {
        let stdout = self
            .executor
            .execute_text(&["volume".to_string(), "ls".to_string(), "-q".to_string()])
            .await?;
        let names: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["volume".to_string(), "inspect".to_string()];
        args.extend(names);
        let stdout = self.executor.execute_text(&args).await?;
        let docs: Vec<Value> =
            serde_json::from_str(&stdout).map_err(|e| Error::json("volume inspect output", e))?;
        Ok(docs
            .into_iter()
            .map(|raw| VolumeInfo {
                name: str_field(&raw, "Name"),
                raw,
            })
            .collect())
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeInfo> {
        let stdout = self
            .executor
            .execute_text(&[
                "volume".to_string(),
                "inspect".to_string(),
                name.to_string(),
            ])
            .await?;
        let docs: Vec<Value> =
            serde_json::from_str(&stdout).map_err(|e| Error::json("volume inspect output", e))?;
        docs.into_iter()
            .next()
            .map(|raw| VolumeInfo {
                name: str_field(&raw, "Name"),
                raw,
            })
            .ok_or_else(|| Error::inventory(format!("volume not found: {name}")))
    }

    async fn pull_or_get_image(&self, reference: &str) -> Result<String> {
        let probe = self
            .inspect_many(Some("image"), &[reference.to_string()])
            .await;
        match probe {
            Ok(docs) if !docs.is_empty() => {
                debug!("image {reference} found locally");
                Ok(reference.to_string())
            }
            _ => {
                debug!("pulling image {reference}");
                self.executor
                    .execute(&["pull".to_string(), reference.to_string()])
                    .await?;
                Ok(reference.to_string())
            }
        }
    }

    async fn create_ephemeral(&self, image: &str, mounts: &[EphemeralMount]) -> Result<String> {
        let mut args = vec!["create".to_string()];
        for mount in mounts {
            args.push("--mount".to_string());
            args.push(format!(
                "type=volume,source={},target={},readonly",
                mount.source, mount.target
            ));
        }
        args.push(image.to_string());
        let stdout = self.executor.execute_text(&args).await?;
        Ok(stdout.trim().to_string())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.executor
            .execute(&["rm".to_string(), "-f".to_string(), id.to_string()])
            .await?;
        Ok(())
    }
}

/// Derive a [`PathStat`] from the first header of a tar stream
#[must_use]
pub fn stat_from_tar(bytes: &[u8]) -> Option<PathStat> {
    let mut archive = tar::Archive::new(bytes);
    let entry = archive.entries().ok()?.next()?.ok()?;
    let header = entry.header();
    let perm = header.mode().unwrap_or(0) & 0o777;
    let mut mode = perm;
    let mut link_target = None;
    match header.entry_type() {
        tar::EntryType::Directory => mode |= MODE_DIR,
        tar::EntryType::Symlink => {
            mode |= MODE_SYMLINK;
            link_target = header
                .link_name()
                .ok()
                .flatten()
                .map(|p| p.to_string_lossy().into_owned());
        }
        tar::EntryType::Char => mode |= MODE_DEVICE | MODE_CHARDEV,
        tar::EntryType::Block => mode |= MODE_DEVICE,
        tar::EntryType::Fifo => mode |= MODE_NAMEDPIPE,
        _ => {}
    }
    Some(PathStat { mode, link_target })
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn string_map(value: Option<&Value>) -> IndexMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_predicates() {
        let dir = PathStat {
            mode: MODE_DIR | 0o755,
            link_target: None,
        };
        assert!(dir.is_dir());
        assert!(dir.is_non_regular());
        assert_eq!(dir.perm(), 0o755);

        let link = PathStat {
            mode: MODE_SYMLINK | 0o777,
            link_target: Some("/target".to_string()),
        };
        assert!(link.is_symlink());
        assert!(!link.is_non_regular());

        assert!(!PathStat::regular(0o644).is_non_regular());
        assert!(PathStat {
            mode: MODE_SOCKET,
            link_target: None
        }
        .is_non_regular());
    }

    #[test]
    fn test_diff_kind_codes() {
        assert_eq!(DiffKind::from_code(0), Some(DiffKind::Modified));
        assert_eq!(DiffKind::from_code(1), Some(DiffKind::Added));
        assert_eq!(DiffKind::from_code(2), Some(DiffKind::Deleted));
        assert_eq!(DiffKind::from_code(9), None);
    }

    #[test]
    fn test_parse_diff_output() {
        let entries = parse_diff_output("A /new/file.txt\nD /gone\nC /etc/conf\n");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, DiffKind::Added);
        assert_eq!(entries[0].path, "/new/file.txt");
        assert_eq!(entries[1].kind, DiffKind::Deleted);
        assert_eq!(entries[2].kind, DiffKind::Modified);
    }

    #[test]
    fn test_stat_from_tar_file_and_symlink() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o640);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, "f.txt", &b"hi"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();
        let stat = stat_from_tar(&bytes).unwrap();
        assert!(!stat.is_non_regular());
        assert_eq!(stat.perm(), 0o640);

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(tar::EntryType::Symlink);
        builder
            .append_link(&mut header, "ln", "/usr/bin/python3")
            .unwrap();
        let bytes = builder.into_inner().unwrap();
        let stat = stat_from_tar(&bytes).unwrap();
        assert!(stat.is_symlink());
        assert_eq!(stat.link_target.as_deref(), Some("/usr/bin/python3"));
    }

    #[test]
    fn test_snapshot_from_inspect() {
        let ctn = json!({
            "Id": "abc123",
            "Name": "/proj1_web",
            "Image": "sha256:deadbeef",
            "Args": ["--flag=1"],
            "Config": {
                "Image": "nginx:1.25",
                "Labels": {"com.docker.compose.project": "proj1"},
                "Env": ["A=1"],
                "Cmd": ["nginx"],
            },
            "HostConfig": {
                "Binds": ["/data:/data:ro"],
                "NetworkMode": "proj1_default",
                "RestartPolicy": {"Name": "always"},
                "PortBindings": {"80/tcp": [{"HostIp": "", "HostPort": "8080"}]},
            },
            "NetworkSettings": {"Networks": {"proj1_default": {"IPAddress": "10.0.0.2"}}},
        });
        let img = json!({
            "Id": "sha256:deadbeef",
            "RepoTags": ["nginx:1.25"],
            "Config": {
                "Labels": {"maintainer": "nginx"},
                "Env": ["A=1", "B=2"],
                "Volumes": {"/var/cache": {}},
            },
        });
        let snap = ContainerSnapshot::from_inspect(&ctn, Some(&img));
        assert_eq!(snap.name, "proj1_web");
        assert_eq!(snap.image, "nginx:1.25");
        assert_eq!(snap.compose_project(), Some("proj1"));
        assert_eq!(snap.compose_service(), "proj1_web");
        assert_eq!(snap.first_network_address(), Some("10.0.0.2"));
        assert_eq!(snap.image_volumes, vec!["/var/cache".to_string()]);
        assert_eq!(snap.host_config.restart_policy.as_deref(), Some("always"));
        let bindings = &snap.host_config.port_bindings["80/tcp"];
        assert_eq!(bindings[0].host_port.as_deref(), Some("8080"));
        assert_eq!(bindings[0].host_ip, None);
        assert!(!snap.is_proxy_sidecar());
    }

    #[test]
    fn test_sidecar_detection_uses_first_tag() {
        let mut snap = ContainerSnapshot {
            image_tags: vec!["traefik:v3.1".to_string()],
            ..Default::default()
        };
        assert!(snap.is_proxy_sidecar());
        snap.image_tags = vec!["alpine:3".to_string(), "traefik:v3".to_string()];
        assert!(!snap.is_proxy_sidecar());
        snap.image_tags.clear();
        assert!(!snap.is_proxy_sidecar());
    }
}
