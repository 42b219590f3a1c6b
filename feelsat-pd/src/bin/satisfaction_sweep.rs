//! satisfaction-sweep - Offline prediction sweep
//!
//! Trains every configured city and writes the predictions for a paired
//! (temperature, AQI) grid to one CSV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use feelsat_common::config::{load_config, CONFIG_ENV_VAR};
use feelsat_pd::registry::ModelRegistry;
use feelsat_pd::sweep::write_sweep;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "satisfaction-sweep")]
#[command(about = "Evaluate city satisfaction models over a temperature/AQI grid")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Output CSV
    #[arg(short, long, default_value = "satisfaction_sweep.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = ModelRegistry::train_all(&config.cities, &config.model);
    if registry.is_empty() {
        warn!("No city model could be loaded; the sweep will be empty");
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let rows = write_sweep(BufWriter::new(file), &registry).context("Failed to write sweep")?;
    info!(
        rows,
        cities = registry.len(),
        "Sweep written to {}",
        args.output.display()
    );

    Ok(())
}
