//! City ingest workflow
//!
//! Locations → sensors → daily series → merged city series. A failing
//! location or sensor is recorded in the report and skipped, only the
//! location search itself is fatal for the city.

use std::collections::BTreeSet;

use feelsat_common::config::CityConfig;
use feelsat_common::Series;
use tracing::{debug, info, warn};

use crate::merge::merge_by_date_avg;
use crate::services::{AirQualitySource, Coordinates, DateRange, FetchError, SensorId};

/// What a report item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Location,
    Sensor,
}

/// Result of fetching one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Data retrieved; `count` is sensors for a location, days for a sensor
    Fetched { count: usize },
    /// Upstream has nothing for this item
    NoData,
    /// Fetch failed after retries
    Failed { reason: String },
}

impl ItemOutcome {
    fn from_error(error: FetchError) -> Self {
        match error {
            FetchError::NotFound(_) => Self::NoData,
            other => Self::Failed {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub kind: ItemKind,
    pub id: u64,
    pub outcome: ItemOutcome,
}

/// Everything fetched for one city
#[derive(Debug, Clone)]
pub struct CityIngest {
    pub city: String,
    pub sensor_series: Vec<(SensorId, Series)>,
    pub items: Vec<ItemReport>,
    /// Same-day average over all sensor series
    pub merged: Series,
}

impl CityIngest {
    fn count(&self, kind: ItemKind, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|i| i.kind == kind && pred(&i.outcome))
            .count()
    }

    pub fn fetched(&self, kind: ItemKind) -> usize {
        self.count(kind, |o| matches!(o, ItemOutcome::Fetched { .. }))
    }

    pub fn no_data(&self, kind: ItemKind) -> usize {
        self.count(kind, |o| matches!(o, ItemOutcome::NoData))
    }

    pub fn failed(&self, kind: ItemKind) -> usize {
        self.count(kind, |o| matches!(o, ItemOutcome::Failed { .. }))
    }
}

/// Fetch and merge all PM2.5 sensor series around `city`
pub async fn ingest_city(
    source: &dyn AirQualitySource,
    city: &CityConfig,
    radius_m: u32,
    range: &DateRange,
) -> Result<CityIngest, FetchError> {
    let center = Coordinates {
        lat: city.lat,
        lon: city.lon,
    };
    let locations = source.fetch_locations(center, radius_m).await?;

    let mut items = Vec::new();
    let mut sensors: BTreeSet<SensorId> = BTreeSet::new();

    for location in locations {
        let outcome = match source.fetch_sensors(location).await {
            Ok(found) if found.is_empty() => ItemOutcome::NoData,
            Ok(found) => {
                let count = found.len();
                sensors.extend(found);
                ItemOutcome::Fetched { count }
            }
            Err(e) => {
                warn!(city = %city.name, location, error = %e, "Sensor lookup failed");
                ItemOutcome::from_error(e)
            }
        };
        items.push(ItemReport {
            kind: ItemKind::Location,
            id: location,
            outcome,
        });
    }

    let mut sensor_series = Vec::new();
    for sensor in sensors {
        let outcome = match source.fetch_daily_series(sensor, range).await {
            Ok(series) if series.present_count() == 0 => {
                debug!(city = %city.name, sensor, "No daily data");
                ItemOutcome::NoData
            }
            Ok(series) => {
                let count = series.len();
                sensor_series.push((sensor, series));
                ItemOutcome::Fetched { count }
            }
            Err(e) => {
                warn!(city = %city.name, sensor, error = %e, "Daily series fetch failed");
                ItemOutcome::from_error(e)
            }
        };
        items.push(ItemReport {
            kind: ItemKind::Sensor,
            id: sensor,
            outcome,
        });
    }

    let series: Vec<Series> = sensor_series.iter().map(|(_, s)| s.clone()).collect();
    let merged = merge_by_date_avg(&series);

    let ingest = CityIngest {
        city: city.name.clone(),
        sensor_series,
        items,
        merged,
    };

    info!(
        city = %ingest.city,
        sensors_fetched = ingest.fetched(ItemKind::Sensor),
        sensors_empty = ingest.no_data(ItemKind::Sensor),
        sensors_failed = ingest.failed(ItemKind::Sensor),
        days = ingest.merged.len(),
        "City ingest complete"
    );

    Ok(ingest)
}
