//! Raw request point dump
//!
//! Writes the received temperature and AQI arrays to
//! `<city>_temperature_points.csv` and `<city>_aqi_points.csv`. Columns are
//! the union of object keys in first-seen order (each object iterates its
//! keys sorted); non-object items are skipped.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write point objects as CSV, returning the number of rows
pub fn write_points<W: Write>(writer: W, points: &[Value]) -> Result<usize, csv::Error> {
    let objects: Vec<&serde_json::Map<String, Value>> =
        points.iter().filter_map(Value::as_object).collect();

    let mut columns: Vec<&str> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut csv = csv::Writer::from_writer(writer);
    if !columns.is_empty() {
        csv.write_record(&columns)?;
        for object in &objects {
            csv.write_record(columns.iter().map(|c| cell(object.get(*c))))?;
        }
    }
    csv.flush()?;

    Ok(objects.len())
}

fn write_file(path: &Path, points: &[Value]) -> Result<usize, csv::Error> {
    let file = std::fs::File::create(path)?;
    write_points(std::io::BufWriter::new(file), points)
}

/// Dump both arrays for `city_slug` into `dir`. Failures are logged only.
pub fn dump_points(dir: &Path, city_slug: &str, temperature: &[Value], aqi: &[Value]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "Failed to create point dump directory");
        return;
    }

    for (signal, points) in [("temperature", temperature), ("aqi", aqi)] {
        let path = dir.join(format!("{city_slug}_{signal}_points.csv"));
        match write_file(&path, points) {
            Ok(rows) => debug!(path = %path.display(), rows, "Dumped request points"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to dump request points"),
        }
    }
}
