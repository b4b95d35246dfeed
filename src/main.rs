//! GeoCollect - Spatial-Join Aggregator for GeoJSON Layers
//!
//! A CLI tool that downloads polygon boundary layers and a point
//! incident layer, aggregates per-attribute incident values onto each
//! containing polygon, labels the polygons, and exports the enriched
//! layers as GeoJSON.
//!
//! Exit codes:
//!   0 - Success (every selected layer exported)
//!   1 - Runtime error (config, point layer retrieval, etc.)
//!   2 - One or more polygon layers failed; the rest were exported

mod cli;
mod collect;
mod config;
mod export;
mod geometry;
mod label;
mod models;
mod source;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, LayerConfig};
use export::{LayerOutcome, LayerStatus, RunManifest};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use models::FeatureCollection;
use source::LayerSource;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GeoCollect v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the collection workflow
    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .geocollect.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize layers, attributes, and the data source.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let layers = config.selected_layers(args.layers.as_deref())?;
    if layers.is_empty() {
        bail!("No polygon layers configured");
    }
    let attributes = config.collect.attributes.clone();
    if attributes.is_empty() {
        bail!("No attribute keys configured");
    }

    let source = LayerSource::new(&config.source, args.local.clone())?;

    // Step 1: the point layer. Without it there is nothing to join.
    println!("📥 Loading point layer: {}", config.points.id);
    let points = source.load(&config.points.id, &config.points.path).await?;

    // Step 2: polygon layers, fetched concurrently. A failed fetch is
    // recorded per layer so siblings still get processed.
    println!("📥 Loading {} polygon layer(s)...", layers.len());
    let source_ref = &source;
    let fetched: Vec<(LayerConfig, Result<FeatureCollection>)> =
        futures::stream::iter(layers.into_iter().map(|layer| async move {
            let result = source_ref.load(&layer.id, &layer.path).await;
            (layer, result)
        }))
        .buffered(config.general.concurrency.max(1))
        .collect()
        .await;

    // Handle --dry-run: report what was loaded and exit
    if args.dry_run {
        return handle_dry_run(&points, &fetched, &attributes);
    }

    // Step 3: per-layer aggregation, labeling, export
    println!("\n🗺️  Collecting {} attribute(s) per layer...", attributes.len());
    let output_dir = PathBuf::from(&config.general.output_dir);
    let progress = layer_progress(fetched.len() as u64, args.quiet);

    let mut outcomes: Vec<LayerOutcome> = Vec::new();
    for (layer, fetch_result) in fetched {
        progress.set_message(layer.id.clone());
        let outcome = match process_layer(
            &layer,
            fetch_result,
            &points,
            &attributes,
            &output_dir,
            config.general.pretty,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Layer '{}' failed: {:#}", layer.id, e);
                LayerOutcome::failed(&layer.id, format!("{:#}", e))
            }
        };
        outcomes.push(outcome);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let duration = start_time.elapsed().as_secs_f64();
    let failed = outcomes
        .iter()
        .filter(|o| o.status == LayerStatus::Failed)
        .count();
    let exported = outcomes.len() - failed;

    // Step 4: run manifest
    if config.general.manifest {
        let manifest = RunManifest {
            generated_at: Utc::now(),
            point_layer: config.points.id.clone(),
            point_count: points.features.len(),
            attributes,
            duration_seconds: duration,
            layers: outcomes.clone(),
        };
        export::write_manifest(&manifest, &output_dir)?;
    }

    // Print summary
    println!("\n📊 Collection Summary:");
    println!("   Point incidents: {}", points.features.len());
    println!("   Layers exported: {} | failed: {}", exported, failed);
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Done! Output in: {}", output_dir.display());

    if failed > 0 {
        eprintln!("\n⛔ {} layer(s) failed; see log above (exit code 2).", failed);
        return Ok(2);
    }

    Ok(0)
}

/// Aggregate, label, and export one polygon layer.
fn process_layer(
    layer: &LayerConfig,
    fetch_result: Result<FeatureCollection>,
    points: &FeatureCollection,
    attributes: &[String],
    output_dir: &Path,
    pretty: bool,
) -> Result<LayerOutcome> {
    let polygons = fetch_result?;

    let mut enriched = collect::collect(&polygons, points, attributes)
        .with_context(|| format!("Aggregation failed for layer '{}'", layer.id))?;

    label::apply_labels(&mut enriched, &layer.label);

    let file_name = export::output_file_name(&layer.path);
    export::write_collection(&enriched, &output_dir.join(&file_name), pretty)?;

    info!(
        "Layer '{}': {} polygons enriched with {} attribute(s)",
        layer.id,
        enriched.features.len(),
        attributes.len()
    );

    Ok(LayerOutcome::collected(
        &layer.id,
        file_name,
        enriched.features.len(),
    ))
}

/// Handle --dry-run: report loaded layers, do no aggregation or writes.
fn handle_dry_run(
    points: &FeatureCollection,
    fetched: &[(LayerConfig, Result<FeatureCollection>)],
    attributes: &[String],
) -> Result<i32> {
    println!("\n🔍 Dry run: layers validated, nothing aggregated or written.\n");
    println!("   Point incidents: {}", points.features.len());
    println!("   Attributes to collect: {}", attributes.join(", "));
    println!();

    let mut failed = 0;
    for (layer, result) in fetched {
        match result {
            Ok(collection) => {
                println!("   🗺️  {} ({} polygons)", layer.id, collection.features.len());
            }
            Err(e) => {
                println!("   ❌ {} ({:#})", layer.id, e);
                failed += 1;
            }
        }
    }

    println!("\n✅ Dry run complete.");
    Ok(if failed > 0 { 2 } else { 0 })
}

/// Progress bar over layers (hidden in quiet mode).
fn layer_progress(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
