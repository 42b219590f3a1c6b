//! feelsat-aq - Air-quality ingest
//!
//! For each configured city: find PM2.5 monitoring locations around the
//! city center, fetch every sensor's daily averages from OpenAQ, merge them
//! into one daily series and write `<city>_aqi_daily.csv`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use feelsat_aq::export::{aqi_daily_file_name, write_aqi_daily_file};
use feelsat_aq::ingest::ItemKind;
use feelsat_aq::{ingest_city, us_aqi, AqiCategory, DateRange, OpenAqClient};
use feelsat_common::config::{load_config, resolve_openaq_api_key, API_KEY_ENV_VAR, CONFIG_ENV_VAR};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for feelsat-aq
#[derive(Parser, Debug)]
#[command(name = "feelsat-aq")]
#[command(about = "Fetch PM2.5 daily series from OpenAQ and export daily AQI per city")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// OpenAQ API key
    #[arg(long, env = API_KEY_ENV_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Directory for the CSV files (defaults to each city's configured `aqi` path)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only ingest these cities (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<NaiveDate>,

    /// Last day to fetch (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting feelsat-aq (Air-quality ingest)");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &loaded.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    if let (Some(from), Some(to)) = (args.date_from, args.date_to) {
        if from > to {
            bail!("--date-from {} is after --date-to {}", from, to);
        }
    }
    let range = DateRange::new(args.date_from, args.date_to);

    let cities: Vec<_> = if args.cities.is_empty() {
        config.cities.iter().collect()
    } else {
        let mut selected = Vec::new();
        for name in &args.cities {
            match config.city(name) {
                Some(city) => selected.push(city),
                None => bail!("Unknown city: {}", name),
            }
        }
        selected
    };

    let api_key = resolve_openaq_api_key(args.api_key.as_deref(), &config.openaq)?;
    let client = OpenAqClient::new(&config.openaq, api_key)
        .context("Failed to create OpenAQ client")?;

    let mut failed_cities = 0;
    for city in cities {
        info!(city = %city.name, lat = city.lat, lon = city.lon, "Ingesting city");

        let ingest = match ingest_city(&client, city, config.openaq.radius_m, &range).await {
            Ok(ingest) => ingest,
            Err(e) => {
                error!(city = %city.name, error = %e, "Location search failed, skipping city");
                failed_cities += 1;
                continue;
            }
        };

        if ingest.failed(ItemKind::Sensor) > 0 {
            warn!(
                city = %city.name,
                failed = ingest.failed(ItemKind::Sensor),
                "Some sensors could not be fetched"
            );
        }

        if ingest.merged.is_empty() {
            warn!(city = %city.name, "No PM2.5 data, nothing written");
            continue;
        }

        let path = match (&args.output_dir, &city.aqi) {
            (Some(dir), _) => dir.join(aqi_daily_file_name(city)),
            (None, Some(path)) => path.clone(),
            (None, None) => PathBuf::from(aqi_daily_file_name(city)),
        };

        let rows = write_aqi_daily_file(&path, &ingest.merged)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let latest = ingest
            .merged
            .iter()
            .rev()
            .find_map(|r| us_aqi(r.value).ok().flatten());
        if let (Some((first, last)), Some(index)) = (ingest.merged.date_span(), latest) {
            info!(
                city = %city.name,
                rows,
                from = %first,
                to = %last,
                latest_aqi = index,
                category = AqiCategory::from_index(index).label(),
                "Wrote {}",
                path.display()
            );
        }
    }

    if failed_cities > 0 {
        warn!("{} city ingest(s) failed", failed_cities);
    }
    info!("Ingest complete");

    Ok(())
}
