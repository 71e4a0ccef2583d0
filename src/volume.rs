//! Volume reporting and tarring.
//!
//! A volume's content is read by mounting it read-only into an ephemeral
//! container of a throwaway image and fetching the mount path as an
//! archive. The container is force-removed on every exit path.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::inventory::{ContainerEngine, EphemeralMount};

/// Options of a volume-tarring pass
#[derive(Debug, Clone)]
pub struct TarVolumeOptions {
    /// Image for the ephemeral container
    pub image: String,
    /// Compress the archive with gzip
    pub gzip: bool,
}

impl Default for TarVolumeOptions {
    fn default() -> Self {
        Self {
            image: "hello-world".to_string(),
            gzip: false,
        }
    }
}

/// Engine attributes of every volume, serialization-ready
pub async fn volume_attrs<E: ContainerEngine + ?Sized>(engine: &E) -> Result<Vec<Value>> {
    Ok(engine
        .list_volumes()
        .await?
        .into_iter()
        .map(|v| v.raw)
        .collect())
}

/// Fetch a volume's content as a tar archive
pub async fn tar_volume<E: ContainerEngine + ?Sized>(
    engine: &E,
    volume: &str,
    options: &TarVolumeOptions,
) -> Result<Vec<u8>> {
    let mount = format!("/{}", volume.trim_matches('/'));
    let info = engine.get_volume(volume).await?;
    debug!("volume {volume} found as {}", info.name);
    let image = engine.pull_or_get_image(&options.image).await?;
    let container = engine
        .create_ephemeral(
            &image,
            &[EphemeralMount {
                source: info.name,
                target: mount.clone(),
            }],
        )
        .await?;
    debug!("ephemeral container {container} mounting {volume} at {mount}");

    let archived = engine.get_archive(&container, &mount).await;
    let removed = engine.remove_container(&container).await;
    let (bytes, _stat) = archived?;
    removed?;

    if options.gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bytes)
            .map_err(|e| Error::io("compressing volume archive", e))?;
        encoder
            .finish()
            .map_err(|e| Error::io("compressing volume archive", e))
    } else {
        Ok(bytes)
    }
}
