//! Prediction sweep over a paired (temperature, AQI) grid
//!
//! Temperatures −5..60 step 1 are paired index-wise with AQI 1..325 step 5,
//! giving 65 probe points per city.

use std::io::Write;

use crate::registry::ModelRegistry;

pub const SWEEP_HEADER: [&str; 5] = ["city", "temperature", "aqi", "aqi_sat", "weather_sat"];

/// Probe points `(temperature, aqi)`
pub fn sweep_points() -> impl Iterator<Item = (f64, f64)> {
    (-5..60)
        .zip((1..325).step_by(5))
        .map(|(t, a)| (f64::from(t), f64::from(a)))
}

fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.3}")).unwrap_or_default()
}

/// Predict every probe point for every registered city and write CSV rows
pub fn write_sweep<W: Write>(writer: W, registry: &ModelRegistry) -> Result<usize, csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(SWEEP_HEADER)?;

    let mut rows = 0;
    for city in registry.cities() {
        let Some(model) = registry.get(&city) else {
            continue;
        };
        for (temperature, aqi) in sweep_points() {
            let prediction = model.predict(temperature, aqi);
            csv.write_record([
                city.clone(),
                temperature.to_string(),
                aqi.to_string(),
                format_score(prediction.air_quality_satisfaction),
                format_score(prediction.weather_satisfaction),
            ])?;
            rows += 1;
        }
    }

    csv.flush()?;
    Ok(rows)
}
