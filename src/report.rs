//! Container snapshot reports.
//!
//! Serialization-ready summaries of the inventory: per-container labels
//! (with values that merely restate the image dropped) and the raw
//! attribute documents.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::inventory::ContainerSnapshot;

/// Labels of one container next to its image's
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelsEntry {
    /// Container name
    pub name: String,
    /// Container labels, image-identical entries dropped
    pub labels: IndexMap<String, String>,
    /// Labels baked into the image
    pub image_labels: IndexMap<String, String>,
}

/// Per-container label report
#[must_use]
pub fn labels_report(containers: &[ContainerSnapshot]) -> Vec<LabelsEntry> {
    containers
        .iter()
        .map(|snapshot| {
            let mut labels = snapshot.labels.clone();
            for (key, value) in &snapshot.image_labels {
                if labels.get(key) == Some(value) {
                    labels.shift_remove(key);
                }
            }
            LabelsEntry {
                name: snapshot.name.clone(),
                labels,
                image_labels: snapshot.image_labels.clone(),
            }
        })
        .collect()
}

/// Raw attributes of one container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttrsEntry {
    /// Container name
    pub name: String,
    /// The engine's inspect document, verbatim
    pub attrs: Value,
}

/// Per-container raw attribute report
#[must_use]
pub fn attrs_report(containers: &[ContainerSnapshot]) -> Vec<AttrsEntry> {
    containers
        .iter()
        .map(|snapshot| AttrsEntry {
            name: snapshot.name.clone(),
            attrs: snapshot.raw.clone(),
        })
        .collect()
}
