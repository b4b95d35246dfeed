//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// GeoCollect - spatial-join aggregator for GeoJSON layers
///
/// Downloads polygon boundary layers and a point incident layer, then
/// writes each polygon layer back out with per-attribute lists of the
/// incidents contained in each polygon, plus a display label.
///
/// Examples:
///   geocollect
///   geocollect --layer psa,ward --attributes race,age
///   geocollect --local ./data --output-dir ./out --pretty
///   geocollect --dry-run
///   geocollect --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .geocollect.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Polygon layer ids to process (comma-separated)
    ///
    /// Example: --layer psa,census_tract. Defaults to every configured layer.
    #[arg(short, long = "layer", value_name = "IDS", value_delimiter = ',')]
    pub layers: Option<Vec<String>>,

    /// Attribute keys to collect (comma-separated)
    ///
    /// Example: --attributes race,gen,age. Overrides the config file list.
    #[arg(short, long, value_name = "KEYS", value_delimiter = ',')]
    pub attributes: Option<Vec<String>>,

    /// Output directory for enriched layers
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base URL that layer paths are joined onto
    #[arg(long, value_name = "URL", env = "GEOCOLLECT_BASE_URL")]
    pub base_url: Option<String>,

    /// Local directory with layer files instead of downloading
    ///
    /// Layer paths from the config are resolved by file name under this
    /// directory.
    #[arg(long, value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of concurrent layer downloads
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Pretty-print exported JSON
    #[arg(long)]
    pub pretty: bool,

    /// Skip writing the run manifest
    #[arg(long)]
    pub no_manifest: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: fetch and validate layers without aggregating or writing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .geocollect.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref attributes) = self.attributes {
            if attributes.iter().any(|a| a.trim().is_empty()) {
                return Err("Attribute keys must not be empty".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate local directory if provided
        if let Some(ref local_path) = self.local {
            if !local_path.exists() {
                return Err(format!(
                    "Local directory does not exist: {}",
                    local_path.display()
                ));
            }
            if !local_path.is_dir() {
                return Err(format!(
                    "Local path is not a directory: {}",
                    local_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
