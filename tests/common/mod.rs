//! Shared test fixtures: an in-memory container engine.
#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use docker_recon::{
    ContainerEngine, ContainerSnapshot, DiffEntry, EphemeralMount, Error, PathStat, VolumeInfo,
};

/// In-memory [`ContainerEngine`] backed by literal fixtures
#[derive(Debug, Default)]
pub struct MockEngine {
    pub containers: Vec<ContainerSnapshot>,
    /// Archives by `container:path`
    pub archives: HashMap<String, (Vec<u8>, PathStat)>,
    /// Diff entries by container name
    pub diffs: HashMap<String, Vec<DiffEntry>>,
    pub volumes: Vec<VolumeInfo>,
}

impl MockEngine {
    pub fn new(containers: Vec<ContainerSnapshot>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn with_archive(mut self, container: &str, path: &str, bytes: Vec<u8>, stat: PathStat) -> Self {
        self.archives
            .insert(format!("{container}:{path}"), (bytes, stat));
        self
    }

    pub fn with_diff(mut self, container: &str, entries: Vec<DiffEntry>) -> Self {
        self.diffs.insert(container.to_string(), entries);
        self
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>, Error> {
        Ok(self.containers.clone())
    }

    async fn get_container(&self, name_or_id: &str) -> Result<ContainerSnapshot, Error> {
        self.containers
            .iter()
            .find(|c| c.name == name_or_id || c.id == name_or_id)
            .cloned()
            .ok_or_else(|| Error::inventory(format!("container not found: {name_or_id}")))
    }

    async fn get_archive(&self, container: &str, path: &str) -> Result<(Vec<u8>, PathStat), Error> {
        self.archives
            .get(&format!("{container}:{path}"))
            .cloned()
            .ok_or_else(|| Error::inventory(format!("no archive for {container}:{path}")))
    }

    async fn diff(&self, container: &str) -> Result<Vec<DiffEntry>, Error> {
        Ok(self.diffs.get(container).cloned().unwrap_or_default())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, Error> {
        Ok(self.volumes.clone())
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeInfo, Error> {
        self.volumes
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| Error::inventory(format!("volume not found: {name}")))
    }

    async fn pull_or_get_image(&self, reference: &str) -> Result<String, Error> {
        Ok(reference.to_string())
    }

    async fn create_ephemeral(
        &self,
        _image: &str,
        _mounts: &[EphemeralMount],
    ) -> Result<String, Error> {
        Ok("ephemeral".to_string())
    }

    async fn remove_container(&self, _id: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Build a snapshot the way the engine would report it
#[allow(clippy::too_many_arguments)]
pub fn container(
    name: &str,
    image: &str,
    labels: &[(&str, &str)],
    args: &[&str],
    env: &[&str],
    ipaddr: Option<&str>,
) -> ContainerSnapshot {
    let labels: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::String((*v).to_string())))
        .collect();
    let networks = match ipaddr {
        Some(addr) => serde_json::json!({"xyz": {"IPAddress": addr}}),
        None => serde_json::json!({}),
    };
    let inspect = serde_json::json!({
        "Id": format!("id-{name}"),
        "Name": format!("/{name}"),
        "Image": format!("sha256:{name}"),
        "Args": args,
        "Config": {
            "Image": image,
            "Labels": labels,
            "Env": env,
        },
        "HostConfig": {},
        "NetworkSettings": {"Networks": networks},
    });
    let image_doc = serde_json::json!({
        "Id": format!("sha256:{name}"),
        "RepoTags": [image],
        "Config": {},
    });
    ContainerSnapshot::from_inspect(&inspect, Some(&image_doc))
}
