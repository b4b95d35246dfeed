//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.geocollect.toml` files. The defaults reproduce the DC stop-and-frisk
//! run this tool was built for: five district boundary layers joined
//! against the field-contact incident layer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::label::LabelRule;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".geocollect.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// The point (incident) layer to join against every polygon layer.
    #[serde(default)]
    pub points: PointsConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub collect: CollectConfig,

    /// Polygon layers to process.
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            source: SourceConfig::default(),
            points: PointsConfig::default(),
            collect: CollectConfig::default(),
            layers: default_layers(),
        }
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Attribute keys to collect from contained points, in order.
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            attributes: default_attributes(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for enriched layer files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Pretty-print exported JSON.
    #[serde(default)]
    pub pretty: bool,

    /// Write a manifest.json summarizing the run.
    #[serde(default = "default_true")]
    pub manifest: bool,

    /// Number of concurrent layer downloads.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pretty: false,
            manifest: true,
            concurrency: default_concurrency(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    "collected".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Upstream document source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL that layer paths are joined onto. Layer paths starting
    /// with http(s):// are used as-is.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries per document on failure.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://raw.githubusercontent.com/mahkah/dc_stop_and_frisk".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    3
}

/// The incident point layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    /// Identifier used in logs and the manifest.
    #[serde(default = "default_points_id")]
    pub id: String,

    /// Path joined onto the base URL (or under --local).
    #[serde(default = "default_points_path")]
    pub path: String,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            id: default_points_id(),
            path: default_points_path(),
        }
    }
}

fn default_points_id() -> String {
    "sf_field_contacts".to_string()
}

fn default_points_path() -> String {
    "mahkah-update-2017-data/transformed_data/SF_Field_Contact_locations.geojson".to_string()
}

/// One polygon layer: where to fetch it and how to label its polygons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Identifier for --layer selection, logs, and the manifest.
    pub id: String,

    /// Path joined onto the base URL (or under --local).
    pub path: String,

    /// How to derive each polygon's `polygonName`.
    pub label: LabelRule,
}

fn default_attributes() -> Vec<String> {
    ["race", "gen", "age", "date", "force"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig {
            id: "psa".to_string(),
            path: "master/original_data/Police_Service_Areas.geojson".to_string(),
            label: LabelRule::Prefix {
                prefix: "Police Service Area ".to_string(),
                field: "name".to_string(),
            },
        },
        LayerConfig {
            id: "census_tract".to_string(),
            path: "master/original_data/Census_Tracts_in_2010.geojson".to_string(),
            label: LabelRule::Prefix {
                prefix: "Census Tract ".to_string(),
                field: "TRACT".to_string(),
            },
        },
        LayerConfig {
            id: "neighborhood".to_string(),
            path: "master/original_data/Neighborhood_Clusters.geojson".to_string(),
            label: LabelRule::Field {
                field: "NBH_NAMES".to_string(),
            },
        },
        LayerConfig {
            id: "police_sector".to_string(),
            path: "master/original_data/Police_Sectors.geojson".to_string(),
            label: LabelRule::Prefix {
                prefix: "Police Sector ".to_string(),
                field: "name".to_string(),
            },
        },
        LayerConfig {
            id: "ward".to_string(),
            path: "master/original_data/Ward_from_2012.geojson".to_string(),
            label: LabelRule::Field {
                field: "name".to_string(),
            },
        },
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.display().to_string();
        }
        if let Some(ref base_url) = args.base_url {
            self.source.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(ref attributes) = args.attributes {
            self.collect.attributes = attributes.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        // Flags always override
        if args.pretty {
            self.general.pretty = true;
        }
        if args.no_manifest {
            self.general.manifest = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Layers selected for this run: all of them, or the subset named
    /// by --layer. Unknown ids are reported as an error.
    pub fn selected_layers(&self, requested: Option<&[String]>) -> Result<Vec<LayerConfig>> {
        let Some(requested) = requested else {
            return Ok(self.layers.clone());
        };

        let mut selected = Vec::new();
        for id in requested {
            let layer = self
                .layers
                .iter()
                .find(|l| &l.id == id)
                .with_context(|| format!("Unknown layer id: {}", id))?;
            selected.push(layer.clone());
        }
        Ok(selected)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
