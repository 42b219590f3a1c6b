//! Configuration loading and resolution
//!
//! One TOML file configures both services. Resolution order for the file:
//! 1. Command-line argument (highest priority)
//! 2. `FEELSAT_CONFIG` environment variable
//! 3. User config file (`~/.config/feelsat/config.toml` on Linux)
//! 4. System config file (`/etc/feelsat/config.toml`, Linux only)
//! 5. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FEELSAT_CONFIG";

/// Environment variable carrying the OpenAQ API key
pub const API_KEY_ENV_VAR: &str = "FEELSAT_OPENAQ_API_KEY";

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub openaq: OpenAqConfig,
    pub model: ModelConfig,
    pub service: ServiceConfig,
    pub cities: Vec<CityConfig>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            openaq: OpenAqConfig::default(),
            model: ModelConfig::default(),
            service: ServiceConfig::default(),
            cities: default_cities(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// OpenAQ v3 ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAqConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Search radius around each city center, in meters
    pub radius_m: u32,
    /// ISO country filter for location search
    pub country: Option<String>,
    /// Page size for paginated endpoints
    pub page_limit: u32,
    /// Upper bound on pages fetched per sensor
    pub max_pages: u32,
    /// Fixed delay between consecutive requests
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for OpenAqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openaq.org/v3".to_string(),
            api_key: None,
            radius_m: 50_000,
            country: Some("PK".to_string()),
            page_limit: 1000,
            max_pages: 100,
            page_delay_ms: 200,
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry/backoff settings for upstream requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            multiplier: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

/// Regressor family used for satisfaction models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    GradientBoosting,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Boosting rounds
    pub iterations: usize,
    pub learning_rate: f64,
    pub max_depth: u32,
    pub min_leaf_size: usize,
    /// Fraction of rows drawn (without replacement) before fitting
    pub subsample: f64,
    pub seed: u64,
    /// Minimum complete rows required to train a dimension
    pub min_samples: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::GradientBoosting,
            iterations: 200,
            learning_rate: 0.05,
            max_depth: 3,
            min_leaf_size: 1,
            subsample: 1.0,
            seed: 42,
            min_samples: 5,
        }
    }
}

/// Prediction service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// Downstream automation endpoint receiving every prediction
    pub forward_url: Option<String>,
    pub forward_timeout_secs: u64,
    /// When set, raw request points are dumped here as CSV
    pub points_dump_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            forward_url: Some("http://localhost:1880/predictions".to_string()),
            forward_timeout_secs: 60,
            points_dump_dir: None,
        }
    }
}

/// One city: search center for ingestion plus its training sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Hourly/daily weather CSV with `date,temp`
    pub weather: Option<PathBuf>,
    /// Daily or sparse AQI CSV with `date,aqi`
    pub aqi: Option<PathBuf>,
    /// Survey CSV with `date,weather_satisfaction,air_quality_satisfaction`
    pub feeling: Option<PathBuf>,
}

impl CityConfig {
    fn with_sources(name: &str, lat: f64, lon: f64) -> Self {
        let stem = city_slug(name);
        Self {
            name: name.to_string(),
            lat,
            lon,
            weather: Some(PathBuf::from(format!("data/{stem}_weather.csv"))),
            aqi: Some(PathBuf::from(format!("data/{stem}_aqi_daily.csv"))),
            feeling: Some(PathBuf::from(format!("data/{stem}_satisfaction.csv"))),
        }
    }

    /// File-name stem used for per-city artifacts
    pub fn slug(&self) -> String {
        city_slug(&self.name)
    }
}

/// Lowercase city name with whitespace replaced by `_`
pub fn city_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(char::is_whitespace, "_")
}

fn default_cities() -> Vec<CityConfig> {
    vec![
        CityConfig::with_sources("Lahore", 31.5204, 74.3587),
        CityConfig::with_sources("Karachi", 24.8607, 67.0011),
        CityConfig::with_sources("Islamabad", 33.6844, 73.0479),
    ]
}

impl TomlConfig {
    /// Look up a city by name, ignoring case
    pub fn city(&self, name: &str) -> Option<&CityConfig> {
        let name = name.trim();
        self.cities.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Reject configurations that would only fail later at runtime
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<String> = Vec::new();
        for city in &self.cities {
            if city.name.trim().is_empty() {
                return Err(Error::Config("City name must not be empty".to_string()));
            }
            let key = city.name.trim().to_lowercase();
            if seen.contains(&key) {
                return Err(Error::Config(format!("Duplicate city: {}", city.name)));
            }
            seen.push(key);

            if !(-90.0..=90.0).contains(&city.lat) || !(-180.0..=180.0).contains(&city.lon) {
                return Err(Error::Config(format!(
                    "Invalid coordinates for {}: ({}, {})",
                    city.name, city.lat, city.lon
                )));
            }
        }

        let model = &self.model;
        if !(model.subsample > 0.0 && model.subsample <= 1.0) {
            return Err(Error::Config(format!(
                "model.subsample must be in (0, 1], got {}",
                model.subsample
            )));
        }
        if model.learning_rate.is_nan() || model.learning_rate <= 0.0 {
            return Err(Error::Config(format!(
                "model.learning_rate must be positive, got {}",
                model.learning_rate
            )));
        }
        if model.iterations == 0 || model.max_depth == 0 || model.min_samples == 0 {
            return Err(Error::Config(
                "model.iterations, model.max_depth and model.min_samples must be at least 1"
                    .to_string(),
            ));
        }

        if self.openaq.max_pages == 0 {
            return Err(Error::Config("openaq.max_pages must be at least 1".to_string()));
        }

        let retry = &self.openaq.retry;
        if retry.max_attempts == 0 {
            return Err(Error::Config("openaq.retry.max_attempts must be at least 1".to_string()));
        }
        if retry.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "openaq.retry.multiplier must be >= 1.0, got {}",
                retry.multiplier
            )));
        }

        Ok(())
    }

    /// Make relative city source paths relative to `base` instead of the
    /// process working directory
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        for city in &mut self.cities {
            for path in [&mut city.weather, &mut city.aqi, &mut city.feeling]
                .into_iter()
                .flatten()
            {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        if let Some(dir) = self.service.points_dump_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// A configuration together with the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// `None` when compiled defaults are in use
    pub source: Option<PathBuf>,
}

/// Locate the configuration file.
///
/// An explicit CLI path or `FEELSAT_CONFIG` value is returned even if it
/// does not exist, so the caller can report it. Default locations are only
/// returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config file
    if let Some(path) = dirs::config_dir().map(|d| d.join("feelsat").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config file
    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/feelsat/config.toml");
        if system.exists() {
            return Some(system);
        }
    }

    None
}

/// Read and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: TomlConfig = toml::from_str(&content).map_err(|source| Error::ParseConfig {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.resolve_relative_paths(base);
    }

    config.validate()?;
    Ok(config)
}

/// Resolve, read and validate configuration, falling back to defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(LoadedConfig {
                config,
                source: Some(path),
            })
        }
        None => {
            info!("No configuration file found, using compiled defaults");
            let config = TomlConfig::default();
            config.validate()?;
            Ok(LoadedConfig {
                config,
                source: None,
            })
        }
    }
}

/// Resolve the OpenAQ API key
///
/// **Priority:** CLI → ENV → TOML
pub fn resolve_openaq_api_key(cli_key: Option<&str>, openaq: &OpenAqConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR).ok();

    let candidates = [
        ("command line", cli_key.map(str::to_string)),
        ("environment", env_key),
        ("TOML", openaq.api_key.clone()),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(s, _)| *s).collect();
        warn!(
            "OpenAQ API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, key)) => {
            info!("OpenAQ API key loaded from {}", source);
            Ok(key.trim().to_string())
        }
        None => Err(Error::MissingApiKey {
            env_var: API_KEY_ENV_VAR,
        }),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
