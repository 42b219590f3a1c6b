//! Daily AQI CSV export
//!
//! Writes `<city>_aqi_daily.csv` with header `date,aqi_us,pm25_ugm3`.
//! Absent values are written as empty cells.

use std::io::Write;
use std::path::{Path, PathBuf};

use feelsat_common::config::CityConfig;
use feelsat_common::Series;
use thiserror::Error;
use tracing::{info, warn};

use crate::aqi::us_aqi;

pub const AQI_DAILY_HEADER: [&str; 3] = ["date", "aqi_us", "pm25_ugm3"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Artifact file name for a city
pub fn aqi_daily_file_name(city: &CityConfig) -> String {
    format!("{}_aqi_daily.csv", city.slug())
}

/// Write the daily series as CSV, returning the number of data rows.
///
/// A concentration the converter rejects keeps its `pm25_ugm3` cell and
/// leaves `aqi_us` empty.
pub fn write_aqi_daily<W: Write>(writer: W, series: &Series) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(AQI_DAILY_HEADER)?;

    for reading in series {
        let aqi = match us_aqi(reading.value) {
            Ok(aqi) => aqi,
            Err(e) => {
                warn!(date = %reading.date, error = %e, "Cannot convert PM2.5 to AQI");
                None
            }
        };

        csv.write_record([
            reading.date.format("%Y-%m-%d").to_string(),
            aqi.map(|a| a.to_string()).unwrap_or_default(),
            reading.value.map(|v| format!("{v:.2}")).unwrap_or_default(),
        ])?;
    }

    csv.flush()?;
    Ok(series.len())
}

/// Write the CSV to `path`, creating parent directories when missing.
/// Returns the number of data rows.
pub fn write_aqi_daily_file(path: &Path, series: &Series) -> Result<usize, ExportError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Create {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let file = std::fs::File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;

    let rows = write_aqi_daily(std::io::BufWriter::new(file), series)?;
    info!(rows, path = %path.display(), "Wrote daily AQI CSV");

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feelsat_common::Reading;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn render(series: &Series) -> String {
        let mut buffer = Vec::new();
        write_aqi_daily(&mut buffer, series).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_rows_and_formatting() {
        let series = Series::from_readings(vec![
            Reading::present(day(2), 20.5),
            Reading::present(day(1), 12.0),
        ])
        .unwrap();

        assert_eq!(
            render(&series),
            "date,aqi_us,pm25_ugm3\n2024-01-01,50,12.00\n2024-01-02,69,20.50\n"
        );
    }

    #[test]
    fn test_absent_and_invalid_values_leave_empty_cells() {
        let series = Series::from_readings(vec![
            Reading::new(day(1), None),
            Reading::present(day(2), -3.0),
        ])
        .unwrap();

        assert_eq!(
            render(&series),
            "date,aqi_us,pm25_ugm3\n2024-01-01,,\n2024-01-02,,-3.00\n"
        );
    }

    #[test]
    fn test_empty_series_writes_header_only() {
        assert_eq!(render(&Series::default()), "date,aqi_us,pm25_ugm3\n");
    }

    #[test]
    fn test_file_written_with_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/lahore_aqi_daily.csv");
        let series = Series::from_readings(vec![Reading::present(day(1), 12.0)]).unwrap();

        let rows = write_aqi_daily_file(&path, &series).unwrap();

        assert_eq!(rows, 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("date,aqi_us,pm25_ugm3\n"));
    }

    #[test]
    fn test_file_name_uses_slug() {
        let city = CityConfig {
            name: "Dera Ghazi Khan".to_string(),
            lat: 30.0,
            lon: 70.6,
            weather: None,
            aqi: None,
            feeling: None,
        };
        assert_eq!(aqi_daily_file_name(&city), "dera_ghazi_khan_aqi_daily.csv");
    }
}
