//! Training source loaders
//!
//! Three CSV inputs per city, each keyed by a `date` column:
//! - weather: `temp` (hourly or daily)
//! - AQI: `aqi`, or `aqi_us` as written by the ingest step
//! - feeling survey: `weather_satisfaction`, `air_quality_satisfaction`
//!
//! Empty or non-numeric cells are absent values. Rows whose date cannot be
//! parsed are dropped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use feelsat_common::config::CityConfig;
use feelsat_common::{time, Reading};
use thiserror::Error;
use tracing::{debug, warn};

const DATE_COLUMN: &[&str] = &["date"];
const TEMP_COLUMN: &[&str] = &["temp"];
const AQI_COLUMN: &[&str] = &["aqi", "aqi_us"];
const WEATHER_SAT_COLUMN: &[&str] = &["weather_satisfaction"];
const AIR_SAT_COLUMN: &[&str] = &["air_quality_satisfaction"];

/// Source loading errors; all of them name the offending file
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No {kind} source configured for {city}")]
    NotConfigured { city: String, kind: &'static str },

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },
}

/// One survey response
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    pub date: NaiveDate,
    pub weather_satisfaction: Option<f64>,
    pub air_quality_satisfaction: Option<f64>,
}

/// All inputs of one city
#[derive(Debug, Clone, Default)]
pub struct CitySources {
    pub temperature: Vec<Reading>,
    pub aqi: Vec<Reading>,
    pub survey: Vec<SurveyRecord>,
}

/// Empty cells and non-numeric text are absent
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}

/// Read `(date, values...)` rows.
///
/// With `allow_empty`, a file without data rows is accepted even when its
/// header lacks the columns.
fn read_rows<R: Read>(
    reader: R,
    path: &Path,
    value_columns: &[&[&str]],
    allow_empty: bool,
) -> Result<Vec<(NaiveDate, Vec<Option<f64>>)>, SourceError> {
    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut missing = None;
    let date_index = find_column(&headers, DATE_COLUMN);
    if date_index.is_none() {
        missing = Some(DATE_COLUMN[0]);
    }
    let mut indices = Vec::with_capacity(value_columns.len());
    for names in value_columns {
        match find_column(&headers, names) {
            Some(index) => indices.push(index),
            None => {
                missing.get_or_insert(names[0]);
            }
        }
    }

    let mut records = reader.records();

    let date_index = match (missing, date_index) {
        (None, Some(index)) => index,
        (column, _) => {
            let has_rows = records.next().is_some();
            if allow_empty && !has_rows {
                debug!(path = %path.display(), "Empty source file");
                return Ok(Vec::new());
            }
            return Err(SourceError::MissingColumn {
                path: path.to_path_buf(),
                column: column.unwrap_or(DATE_COLUMN[0]).to_string(),
            });
        }
    };

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in records {
        let record = record.map_err(csv_error)?;
        let Some(date) = record.get(date_index).and_then(time::parse_day) else {
            dropped += 1;
            continue;
        };
        let values = indices
            .iter()
            .map(|&i| record.get(i).and_then(parse_number))
            .collect();
        rows.push((date, values));
    }

    if dropped > 0 {
        warn!(path = %path.display(), dropped, "Dropped rows with unparseable dates");
    }

    Ok(rows)
}

fn open(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn single_column(rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Vec<Reading> {
    rows.into_iter()
        .map(|(date, values)| Reading::new(date, values.first().copied().flatten()))
        .collect()
}

/// Temperature observations; `path` is only used in errors and logs
pub fn read_weather<R: Read>(reader: R, path: &Path) -> Result<Vec<Reading>, SourceError> {
    read_rows(reader, path, &[TEMP_COLUMN], false).map(single_column)
}

/// AQI observations. A file with no rows at all yields no observations.
pub fn read_aqi<R: Read>(reader: R, path: &Path) -> Result<Vec<Reading>, SourceError> {
    read_rows(reader, path, &[AQI_COLUMN], true).map(single_column)
}

pub fn read_feeling<R: Read>(reader: R, path: &Path) -> Result<Vec<SurveyRecord>, SourceError> {
    let rows = read_rows(reader, path, &[WEATHER_SAT_COLUMN, AIR_SAT_COLUMN], false)?;
    Ok(rows
        .into_iter()
        .map(|(date, values)| SurveyRecord {
            date,
            weather_satisfaction: values.first().copied().flatten(),
            air_quality_satisfaction: values.get(1).copied().flatten(),
        })
        .collect())
}

pub fn load_weather(path: &Path) -> Result<Vec<Reading>, SourceError> {
    read_weather(open(path)?, path)
}

pub fn load_aqi(path: &Path) -> Result<Vec<Reading>, SourceError> {
    read_aqi(open(path)?, path)
}

pub fn load_feeling(path: &Path) -> Result<Vec<SurveyRecord>, SourceError> {
    read_feeling(open(path)?, path)
}

/// Load all three sources configured for `city`
pub fn load_city_sources(city: &CityConfig) -> Result<CitySources, SourceError> {
    let require = |path: &Option<PathBuf>, kind: &'static str| {
        path.clone().ok_or_else(|| SourceError::NotConfigured {
            city: city.name.clone(),
            kind,
        })
    };

    let weather = require(&city.weather, "weather")?;
    let aqi = require(&city.aqi, "aqi")?;
    let feeling = require(&city.feeling, "feeling")?;

    let sources = CitySources {
        temperature: load_weather(&weather)?,
        aqi: load_aqi(&aqi)?,
        survey: load_feeling(&feeling)?,
    };

    debug!(
        city = %city.name,
        temperature = sources.temperature.len(),
        aqi = sources.aqi.len(),
        survey = sources.survey.len(),
        "Loaded city sources"
    );

    Ok(sources)
}
