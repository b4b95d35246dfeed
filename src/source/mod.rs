//! Layer retrieval.
//!
//! Named GeoJSON documents are fetched over HTTP from a configured base
//! URL, or read from a local directory in `--local` mode. Every document
//! is validated to be a feature collection before aggregation is
//! attempted; a failure here names the layer and never produces partial
//! input for the join.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::models::FeatureCollection;

/// Loads layer documents from the network or a local directory.
pub struct LayerSource {
    client: reqwest::Client,
    base_url: String,
    retries: usize,
    local_dir: Option<PathBuf>,
}

impl LayerSource {
    /// Create a source. With `local_dir` set, no network access happens.
    pub fn new(config: &SourceConfig, local_dir: Option<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retries: config.retries.max(1),
            local_dir,
        })
    }

    /// Load and validate one layer document.
    pub async fn load(&self, id: &str, path: &str) -> Result<FeatureCollection> {
        let collection = match &self.local_dir {
            Some(dir) => self.load_local(dir, path),
            None => self.fetch_remote(path).await,
        }
        .with_context(|| format!("Failed to load layer '{}'", id))?;

        if !collection.is_feature_collection() {
            bail!(
                "Layer '{}' is not a FeatureCollection (type: {})",
                id,
                collection.kind
            );
        }

        info!(
            "Layer '{}' loaded: {} features",
            id,
            collection.features.len()
        );
        Ok(collection)
    }

    /// Resolve a layer path by file name under the local directory.
    fn load_local(&self, dir: &Path, path: &str) -> Result<FeatureCollection> {
        let file_name = Path::new(path)
            .file_name()
            .with_context(|| format!("Layer path has no file name: {}", path))?;
        let full_path = dir.join(file_name);
        debug!("Reading local file: {}", full_path.display());

        let content = std::fs::read_to_string(&full_path)
            .with_context(|| format!("Failed to read {}", full_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse GeoJSON in {}", full_path.display()))
    }

    async fn fetch_remote(&self, path: &str) -> Result<FeatureCollection> {
        let url = self.url_for(path);

        for attempt in 1..=self.retries {
            match self.try_fetch(&url).await {
                Ok(collection) => return Ok(collection),
                Err(e) if attempt < self.retries => {
                    warn!("Attempt {}/{} failed for {}: {}", attempt, self.retries, url, e);
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }

        bail!("Retries exhausted fetching {}", url)
    }

    /// Absolute layer paths are used as-is; relative paths are joined
    /// onto the base URL.
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<FeatureCollection> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Request timed out for {}", url)
            } else if e.is_connect() {
                anyhow::anyhow!("Cannot connect to {}", url)
            } else {
                anyhow::anyhow!("Failed to send request: {}", e)
            }
        })?;

        if !response.status().is_success() {
            bail!("HTTP {} for {}", response.status(), url);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse GeoJSON from {}", url))
    }
}
