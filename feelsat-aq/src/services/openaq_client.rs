//! OpenAQ v3 API client
//!
//! Requests run one at a time. A rate limiter enforces the configured gap
//! between consecutive requests, and transient failures go through the
//! client's [`RetryPolicy`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use feelsat_common::config::OpenAqConfig;
use feelsat_common::{time, Reading, Series};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{
    AirQualitySource, Coordinates, DateRange, FetchError, LocationId, RetryPolicy, SensorId,
    PM25_PARAMETER_ID,
};

const USER_AGENT: &str = concat!("feelsat-aq/", env!("CARGO_PKG_VERSION"));

/// Location search gets a shorter timeout than the paginated endpoints
const LOCATION_TIMEOUT_SECS: u64 = 30;

/// Longest error body kept in `FetchError::Api`
const ERROR_BODY_LIMIT: usize = 200;

/// Paginated response envelope
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Entry of `/locations`
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    pub id: LocationId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `/locations/{id}/sensors`
#[derive(Debug, Clone, Deserialize)]
pub struct SensorRecord {
    pub id: SensorId,
    #[serde(default)]
    pub parameters_id: Option<u32>,
    #[serde(default)]
    pub parameter: Option<ParameterRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterRef {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl SensorRecord {
    /// Flat `parameters_id` wins over the nested `parameter.id`
    pub fn parameter_id(&self) -> Option<u32> {
        self.parameters_id.or_else(|| self.parameter.as_ref().map(|p| p.id))
    }

    pub fn measures_pm25(&self) -> bool {
        self.parameter_id() == Some(PM25_PARAMETER_ID)
    }
}

/// Entry of `/sensors/{id}/days`
#[derive(Debug, Clone, Deserialize)]
pub struct DailyRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    #[serde(rename = "datetimeFrom", default)]
    pub datetime_from: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timestamp {
    #[serde(default)]
    pub utc: Option<String>,
}

impl DailyRecord {
    /// Calendar day from the first ten characters of the timestamp
    pub fn day(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref().or_else(|| {
            self.period
                .as_ref()
                .and_then(|p| p.datetime_from.as_ref())
                .and_then(|t| t.utc.as_deref())
        })?;
        time::parse_day(raw.get(..10).unwrap_or(raw))
    }

    pub fn concentration(&self) -> Option<f64> {
        self.average.or(self.value).filter(|v| v.is_finite())
    }
}

/// Rate limiter enforcing a minimum gap between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// OpenAQ v3 API client
pub struct OpenAqClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    country: Option<String>,
    page_limit: u32,
    max_pages: u32,
    request_timeout: Duration,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl OpenAqClient {
    pub fn new(config: &OpenAqConfig, api_key: impl Into<String>) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            country: config.country.clone().filter(|c| !c.trim().is_empty()),
            page_limit: config.page_limit.max(1),
            max_pages: config.max_pages.max(1),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            rate_limiter: Arc::new(RateLimiter::new(config.page_delay_ms)),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    /// Replace the retry policy (tests use fast backoff)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GET `{base}{path}` and decode the JSON body, retrying transient errors
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        self.retry
            .run(path, |attempt| {
                let url = url.as_str();
                async move {
                    self.rate_limiter.wait().await;

                    tracing::debug!(url = %url, attempt, "Querying OpenAQ API");

                    let response = self
                        .http_client
                        .get(url)
                        .header("X-API-Key", &self.api_key)
                        .query(query)
                        .timeout(timeout)
                        .send()
                        .await
                        .map_err(|e| {
                            if e.is_timeout() {
                                FetchError::Timeout(url.to_string())
                            } else {
                                FetchError::Network(e.to_string())
                            }
                        })?;

                    let status = response.status();

                    if status == 404 {
                        return Err(FetchError::NotFound(path.to_string()));
                    }

                    if status == 429 {
                        return Err(FetchError::RateLimited);
                    }

                    if !status.is_success() {
                        let mut error_text = response.text().await.unwrap_or_default();
                        if let Some((cut, _)) = error_text.char_indices().nth(ERROR_BODY_LIMIT) {
                            error_text.truncate(cut);
                        }
                        return Err(FetchError::Api(status.as_u16(), error_text));
                    }

                    let body = response
                        .text()
                        .await
                        .map_err(|e| FetchError::Network(e.to_string()))?;
                    serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
                }
            })
            .await
    }
}

#[async_trait]
impl AirQualitySource for OpenAqClient {
    async fn fetch_locations(
        &self,
        center: Coordinates,
        radius_m: u32,
    ) -> Result<Vec<LocationId>, FetchError> {
        let mut query = vec![
            ("coordinates", format!("{},{}", center.lon, center.lat)),
            ("radius", radius_m.to_string()),
            ("limit", self.page_limit.to_string()),
            ("parameters_id", PM25_PARAMETER_ID.to_string()),
        ];
        if let Some(country) = &self.country {
            query.push(("country_id", country.clone()));
        }

        let page: Page<LocationRecord> = self
            .get_json(
                "/locations",
                &query,
                self.request_timeout
                    .min(Duration::from_secs(LOCATION_TIMEOUT_SECS)),
            )
            .await?;

        tracing::info!(
            lat = center.lat,
            lon = center.lon,
            radius_m,
            locations = page.results.len(),
            "Located PM2.5 monitoring sites"
        );

        Ok(page.results.into_iter().map(|l| l.id).collect())
    }

    async fn fetch_sensors(&self, location: LocationId) -> Result<Vec<SensorId>, FetchError> {
        let page: Page<SensorRecord> = self
            .get_json(
                &format!("/locations/{location}/sensors"),
                &[],
                self.request_timeout,
            )
            .await?;

        let total = page.results.len();
        let sensors: Vec<SensorId> = page
            .results
            .into_iter()
            .filter(SensorRecord::measures_pm25)
            .map(|s| s.id)
            .collect();

        tracing::debug!(
            location,
            total,
            pm25 = sensors.len(),
            "Retrieved sensors for location"
        );

        Ok(sensors)
    }

    async fn fetch_daily_series(
        &self,
        sensor: SensorId,
        range: &DateRange,
    ) -> Result<Series, FetchError> {
        let path = format!("/sensors/{sensor}/days");
        let mut readings: Vec<Reading> = Vec::new();
        let mut seen: HashSet<NaiveDate> = HashSet::new();
        let mut page_number: u32 = 1;

        loop {
            let mut query = vec![
                ("limit", self.page_limit.to_string()),
                ("page", page_number.to_string()),
            ];
            if let Some(from) = range.from {
                query.push(("date_from", from.to_string()));
            }
            if let Some(to) = range.to {
                query.push(("date_to", to.to_string()));
            }

            let page: Page<DailyRecord> =
                match self.get_json(&path, &query, self.request_timeout).await {
                    Ok(page) => page,
                    // No (more) data for this sensor
                    Err(FetchError::NotFound(_)) => break,
                    Err(e) => return Err(e),
                };

            if page.results.is_empty() {
                break;
            }

            let mut repeated = 0usize;
            for record in &page.results {
                let Some(day) = record.day() else {
                    tracing::debug!(sensor, page = page_number, "Skipping record without date");
                    continue;
                };
                if !range.contains(day) {
                    continue;
                }
                if !seen.insert(day) {
                    tracing::debug!(sensor, date = %day, "Duplicate day across pages, keeping first");
                    repeated += 1;
                    continue;
                }
                readings.push(Reading::new(day, record.concentration()));
            }

            // Upstream ignoring `page` serves the same records again
            if repeated == page.results.len() {
                tracing::warn!(sensor, page = page_number, "Page repeated known days, stopping");
                break;
            }
            if page_number >= self.max_pages {
                tracing::warn!(sensor, max_pages = self.max_pages, "Page cap reached, stopping");
                break;
            }

            page_number += 1;
        }

        let series = Series::from_readings(readings)
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::debug!(
            sensor,
            last_page = page_number,
            days = series.len(),
            "Retrieved daily series"
        );

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(200);
        assert_eq!(limiter.min_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAqClient::new(&OpenAqConfig::default(), "key");
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = OpenAqConfig {
            base_url: "http://localhost:9999/v3/".to_string(),
            ..OpenAqConfig::default()
        };
        let client = OpenAqClient::new(&config, "key").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999/v3");
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first_elapsed = start.elapsed();
        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(50));
        assert!(second_elapsed >= Duration::from_millis(90));
    }

    #[test]
    fn test_sensor_parameter_forms() {
        let flat: SensorRecord =
            serde_json::from_str(r#"{"id": 7, "parameters_id": 2}"#).unwrap();
        let nested: SensorRecord =
            serde_json::from_str(r#"{"id": 8, "parameter": {"id": 2, "name": "pm25"}}"#).unwrap();
        let other: SensorRecord =
            serde_json::from_str(r#"{"id": 9, "parameter": {"id": 1, "name": "pm10"}}"#).unwrap();

        assert!(flat.measures_pm25());
        assert!(nested.measures_pm25());
        assert!(!other.measures_pm25());
    }

    #[test]
    fn test_daily_record_forms() {
        let flat: DailyRecord =
            serde_json::from_str(r#"{"date": "2024-02-03T00:00:00Z", "average": 41.5}"#).unwrap();
        assert_eq!(flat.day(), NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(flat.concentration(), Some(41.5));

        let nested: DailyRecord = serde_json::from_str(
            r#"{"value": 12.25, "period": {"datetimeFrom": {"utc": "2024-02-04T00:00:00Z"}}}"#,
        )
        .unwrap();
        assert_eq!(nested.day(), NaiveDate::from_ymd_opt(2024, 2, 4));
        assert_eq!(nested.concentration(), Some(12.25));

        let missing: DailyRecord = serde_json::from_str(r#"{"average": null}"#).unwrap();
        assert_eq!(missing.day(), None);
        assert_eq!(missing.concentration(), None);
    }
}
