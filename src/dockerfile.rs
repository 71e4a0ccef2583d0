//! Image delta builder.
//!
//! Classifies a container's filesystem diff into added/modified/deleted
//! path sets plus symlink restorations, then produces the artifacts that
//! rebuild the container image: a `Dockerfile` replaying the delta on top
//! of the base image, gzipped tarballs of the added and modified paths,
//! and a `.dockerignore` admitting only those tarballs. Artifacts can be
//! drained as an incremental tar stream so responses never buffer the
//! whole archive.

use std::collections::{BTreeMap, BTreeSet};

use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::inventory::{ContainerEngine, DiffKind};

/// Literal `.dockerignore` content shipped with the artifacts
pub const DOCKERIGNORE: &str = "*\n!added.tar.gz\n!modified.tar.gz\n";

/// Classified filesystem delta of a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    /// Paths removed relative to the image, ancestor-free
    pub deleted: BTreeSet<String>,
    /// Paths added, ancestor-free
    pub added: BTreeSet<String>,
    /// Regular files modified in place
    pub modified: BTreeSet<String>,
    /// Symlinks to restore: path to target
    pub link: BTreeMap<String, String>,
}

impl DeltaSummary {
    /// Whether the diff produced no entries at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
            && self.added.is_empty()
            && self.modified.is_empty()
            && self.link.is_empty()
    }
}

/// Options of a Dockerfile reconstruction pass
#[derive(Debug, Clone, Default)]
pub struct DockerfileOptions {
    /// Glob patterns excluding paths from the delta and the tarballs
    pub ignore: Vec<String>,
    /// Emit `LABEL` lines for labels that differ from the image
    pub labels: bool,
    /// Produce the tarball artifacts, not only the Dockerfile
    pub artifacts: bool,
}

/// One produced artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name of the artifact
    pub name: String,
    /// Raw content
    pub bytes: Vec<u8>,
}

fn has_ancestor(set: &BTreeSet<String>, path: &str) -> bool {
    let mut current = path;
    while let Some(pos) = current.rfind('/') {
        current = &current[..pos];
        if current.is_empty() {
            break;
        }
        if set.contains(current) {
            return true;
        }
    }
    false
}

fn ignored(patterns: &[glob::Pattern], path: &str) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

fn compile_ignore(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(|e| Error::parse("ignore pattern", e.to_string())))
        .collect()
}

/// Classify the filesystem diff of a container.
///
/// Paths whose ancestor is already recorded in the same set are elided;
/// non-regular paths (other than directories in the added set) are
/// skipped; symlinks land in the link map instead of the path sets.
pub async fn classify_delta<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &str,
    ignore: &[String],
) -> Result<DeltaSummary> {
    let patterns = compile_ignore(ignore)?;
    let mut summary = DeltaSummary::default();
    for entry in engine.diff(container).await? {
        if ignored(&patterns, &entry.path) {
            debug!("ignored: {}", entry.path);
            continue;
        }
        match entry.kind {
            DiffKind::Deleted => {
                if !has_ancestor(&summary.deleted, &entry.path) {
                    summary.deleted.insert(entry.path);
                }
            }
            DiffKind::Added => {
                if has_ancestor(&summary.added, &entry.path) {
                    continue;
                }
                let (_, stat) = engine.get_archive(container, &entry.path).await?;
                if stat.is_non_regular() && !stat.is_dir() {
                    continue;
                }
                match stat.link_target {
                    Some(target) if stat.is_symlink() => {
                        summary.link.insert(entry.path, target);
                    }
                    _ => {
                        summary.added.insert(entry.path);
                    }
                }
            }
            DiffKind::Modified => {
                let (_, stat) = engine.get_archive(container, &entry.path).await?;
                if stat.is_non_regular() {
                    continue;
                }
                match stat.link_target {
                    Some(target) if stat.is_symlink() => {
                        summary.link.insert(entry.path, target);
                    }
                    _ => {
                        summary.modified.insert(entry.path);
                    }
                }
            }
        }
    }
    Ok(summary)
}

/// Quote a string for a POSIX shell command line
#[must_use]
pub fn shell_quote(text: &str) -> String {
    if text.is_empty() {
        return "''".to_string();
    }
    let safe = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        text.to_string()
    } else {
        format!("'{}'", text.replace('\'', "'\"'\"'"))
    }
}

/// Render the Dockerfile replaying a delta on top of the base image
#[must_use]
pub fn dockerfile_text(
    image: &str,
    labels: &IndexMap<String, String>,
    image_labels: &IndexMap<String, String>,
    delta: &DeltaSummary,
    with_labels: bool,
) -> String {
    let mut lines = vec![format!("FROM {image}")];
    if !delta.deleted.is_empty() {
        let quoted: Vec<String> = delta.deleted.iter().map(|p| shell_quote(p)).collect();
        lines.push(format!("RUN rm -rf {}", quoted.join(" ")));
    }
    if !delta.added.is_empty() {
        lines.push("ADD added.tar.gz /".to_string());
    }
    if !delta.modified.is_empty() {
        lines.push("ADD modified.tar.gz /".to_string());
    }
    for (path, target) in &delta.link {
        lines.push(format!(
            "RUN ln -sf {} {}",
            shell_quote(target),
            shell_quote(path)
        ));
    }
    if with_labels {
        for (key, value) in labels {
            if key.starts_with("com.docker.compose.") {
                continue;
            }
            if image_labels.get(key) != Some(value) {
                lines.push(format!("LABEL {}={}", shell_quote(key), shell_quote(value)));
            }
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Download a path set as one gzipped tar, `None` when the set is empty.
///
/// Directory sources contribute their members under the source path (the
/// engine's root component is replaced); single files keep the source
/// path as the member name. Ignore patterns filter members.
pub async fn collect_archive<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &str,
    paths: &BTreeSet<String>,
    ignore: &[String],
) -> Result<Option<Vec<u8>>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let patterns = compile_ignore(ignore)?;
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for path in paths {
        let (bytes, stat) = engine.get_archive(container, path).await?;
        let source = path.trim_start_matches('/');
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entries = archive
            .entries()
            .map_err(|e| Error::io("reading delta archive", e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| Error::io("reading delta archive member", e))?;
            let member_path = entry
                .path()
                .map_err(|e| Error::io("reading delta member path", e))?
                .into_owned();
            let name = if stat.is_dir() {
                // replace the engine's root component with the source path
                let mut components = member_path.components();
                components.next();
                let remainder = components.as_path();
                if remainder.as_os_str().is_empty() {
                    source.to_string()
                } else {
                    format!("{source}/{}", remainder.display())
                }
            } else {
                source.to_string()
            };
            if ignored(&patterns, &format!("/{name}")) {
                debug!("ignored member: /{name}");
                continue;
            }
            let mut header = entry.header().clone();
            builder
                .append_data(&mut header, &name, &mut entry)
                .map_err(|e| Error::io("writing delta archive member", e))?;
        }
    }
    let encoder = builder
        .into_inner()
        .map_err(|e| Error::io("finishing delta archive", e))?;
    let bytes = encoder
        .finish()
        .map_err(|e| Error::io("compressing delta archive", e))?;
    Ok(Some(bytes))
}

/// Produce the image-rebuild artifacts of a container, in output order
pub async fn build_artifacts<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &str,
    options: &DockerfileOptions,
) -> Result<Vec<Artifact>> {
    let snapshot = engine.get_container(container).await?;
    let delta = classify_delta(engine, container, &options.ignore).await?;
    let mut artifacts = Vec::new();
    if options.artifacts {
        artifacts.push(Artifact {
            name: ".dockerignore".to_string(),
            bytes: DOCKERIGNORE.as_bytes().to_vec(),
        });
        if let Some(bytes) = collect_archive(engine, container, &delta.added, &options.ignore).await? {
            artifacts.push(Artifact {
                name: "added.tar.gz".to_string(),
                bytes,
            });
        }
        if let Some(bytes) =
            collect_archive(engine, container, &delta.modified, &options.ignore).await?
        {
            artifacts.push(Artifact {
                name: "modified.tar.gz".to_string(),
                bytes,
            });
        }
    }
    artifacts.push(Artifact {
        name: "Dockerfile".to_string(),
        bytes: dockerfile_text(
            &snapshot.image,
            &snapshot.labels,
            &snapshot.image_labels,
            &delta,
            options.labels,
        )
        .into_bytes(),
    });
    Ok(artifacts)
}

/// Incremental tar stream over produced artifacts.
///
/// Each call to `next` appends one member and yields the bytes written
/// since the previous call, so callers can stream the archive without
/// buffering it whole.
pub struct ArtifactTarStream {
    builder: Option<tar::Builder<Vec<u8>>>,
    artifacts: std::vec::IntoIter<Artifact>,
}

impl ArtifactTarStream {
    /// Create a stream over the given artifacts
    #[must_use]
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self {
            builder: Some(tar::Builder::new(Vec::new())),
            artifacts: artifacts.into_iter(),
        }
    }
}

impl Iterator for ArtifactTarStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let builder = self.builder.as_mut()?;
        if let Some(artifact) = self.artifacts.next() {
            let mut header = tar::Header::new_gnu();
            header.set_size(artifact.bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            if let Err(e) = builder.append_data(&mut header, &artifact.name, artifact.bytes.as_slice())
            {
                self.builder = None;
                return Some(Err(Error::io("appending artifact", e)));
            }
            return Some(Ok(std::mem::take(builder.get_mut())));
        }
        // last member flushed: finish the archive and yield the terminator
        let builder = self.builder.take()?;
        match builder.into_inner() {
            Ok(rest) => Some(Ok(rest)),
            Err(e) => Some(Err(Error::io("finishing artifact archive", e))),
        }
    }
}
