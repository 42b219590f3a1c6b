//! Upstream data services
//!
//! [`AirQualitySource`] is the seam between the ingest workflow and the
//! remote API, so the workflow can run against any implementation.

pub mod openaq_client;
pub mod retry;

use async_trait::async_trait;
use chrono::NaiveDate;
use feelsat_common::Series;
use thiserror::Error;

pub use openaq_client::{DailyRecord, LocationRecord, OpenAqClient, SensorRecord};
pub use retry::RetryPolicy;

/// OpenAQ location identifier
pub type LocationId = u64;

/// OpenAQ sensor identifier
pub type SensorId = u64;

/// OpenAQ parameter id for PM2.5
pub const PM25_PARAMETER_ID: u32 = 2;

/// Fetch errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited => true,
            Self::Api(status, _) => *status >= 500,
            Self::NotFound(_) | Self::Parse(_) => false,
        }
    }
}

/// Search center, in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Optional inclusive bounds on fetched days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Source of per-sensor PM2.5 daily series for an area
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    /// Locations measuring PM2.5 within `radius_m` of `center`
    async fn fetch_locations(
        &self,
        center: Coordinates,
        radius_m: u32,
    ) -> Result<Vec<LocationId>, FetchError>;

    /// PM2.5 sensors of one location
    async fn fetch_sensors(&self, location: LocationId) -> Result<Vec<SensorId>, FetchError>;

    /// Every daily PM2.5 average a sensor has within `range`
    async fn fetch_daily_series(
        &self,
        sensor: SensorId,
        range: &DateRange,
    ) -> Result<Series, FetchError>;
}
