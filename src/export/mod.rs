//! Enriched layer export.
//!
//! Writes each enriched feature collection as a GeoJSON file named after
//! the source layer (`<stem>_collected.geojson`), plus an optional run
//! manifest summarizing per-layer outcomes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::FeatureCollection;

/// Suffix appended to the layer file stem for enriched output.
pub const COLLECTED_SUFFIX: &str = "_collected";

/// File name of the run manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Derive the output file name for a layer path,
/// e.g. `master/original_data/Police_Service_Areas.geojson`
/// becomes `Police_Service_Areas_collected.geojson`.
pub fn output_file_name(layer_path: &str) -> String {
    let stem = Path::new(layer_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer");
    format!("{}{}.geojson", stem, COLLECTED_SUFFIX)
}

/// Serialize a feature collection to a file, creating the output
/// directory if needed. Key order within property bags is sorted by
/// `serde_json`, so repeated runs produce byte-identical output.
pub fn write_collection(
    collection: &FeatureCollection,
    path: &Path,
    pretty: bool,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let content = if pretty {
        serde_json::to_string_pretty(collection)
    } else {
        serde_json::to_string(collection)
    }
    .context("Failed to serialize feature collection")?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {}", path.display());
    Ok(())
}

/// Status of one layer in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    Collected,
    Failed,
}

/// Per-layer outcome recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerOutcome {
    pub id: String,
    pub status: LayerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LayerOutcome {
    /// Outcome for a successfully exported layer.
    pub fn collected(id: &str, output_file: String, polygon_count: usize) -> Self {
        Self {
            id: id.to_string(),
            status: LayerStatus::Collected,
            output_file: Some(output_file),
            polygon_count: Some(polygon_count),
            error: None,
        }
    }

    /// Outcome for a layer whose processing failed.
    pub fn failed(id: &str, error: String) -> Self {
        Self {
            id: id.to_string(),
            status: LayerStatus::Failed,
            output_file: None,
            polygon_count: None,
            error: Some(error),
        }
    }
}

/// Summary of one complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated_at: DateTime<Utc>,
    pub point_layer: String,
    pub point_count: usize,
    pub attributes: Vec<String>,
    pub duration_seconds: f64,
    pub layers: Vec<LayerOutcome>,
}

/// Write the run manifest into the output directory.
pub fn write_manifest(manifest: &RunManifest, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let path = output_dir.join(MANIFEST_FILE);
    let content =
        serde_json::to_string_pretty(manifest).context("Failed to serialize run manifest")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {}", path.display());
    Ok(path)
}
