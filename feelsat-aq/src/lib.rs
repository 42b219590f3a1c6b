//! feelsat-aq library interface
//!
//! Air-quality ingest: PM2.5 → US AQI conversion, OpenAQ retrieval,
//! per-city merging and the daily CSV artifact consumed by training.

pub mod aqi;
pub mod export;
pub mod ingest;
pub mod merge;
pub mod services;

pub use aqi::{pm25_to_aqi, us_aqi, AqiCategory, AqiError};
pub use ingest::{ingest_city, CityIngest, ItemKind, ItemOutcome, ItemReport};
pub use merge::merge_by_date_avg;
pub use services::{AirQualitySource, DateRange, FetchError, OpenAqClient, RetryPolicy};
