//! Daily aligner
//!
//! Joins temperature, AQI and survey inputs onto the survey calendar:
//!
//! 1. one output row per survey record, ascending by date (stable)
//! 2. temperature: same-day mean
//! 3. AQI: same-day mean, then a continuous daily calendar between the
//!    first and last AQI day, filled by time-weighted interpolation
//! 4. residual gaps in the joined table: linear by row position, then
//!    forward-fill, then back-fill (temp and aqi independently)
//!
//! Satisfaction values pass through untouched.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use feelsat_common::{time, Reading};

use crate::sources::SurveyRecord;

/// One day of the training table
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub temp: Option<f64>,
    pub aqi: Option<f64>,
    pub weather_satisfaction: Option<f64>,
    pub air_quality_satisfaction: Option<f64>,
}

/// Mean of present values per calendar day
pub fn daily_means(observations: &[Reading]) -> BTreeMap<NaiveDate, f64> {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for reading in observations {
        if let Some(value) = reading.value.filter(|v| v.is_finite()) {
            by_date.entry(reading.date).or_default().push(value);
        }
    }

    by_date
        .into_iter()
        .map(|(date, mut values)| {
            values.sort_by(f64::total_cmp);
            (date, values.iter().sum::<f64>() / values.len() as f64)
        })
        .collect()
}

/// Expand sparse daily points to every day between the first and the last,
/// weighting by elapsed days
pub fn interpolate_daily(known: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    let mut filled = BTreeMap::new();
    let points: Vec<(NaiveDate, f64)> = known.iter().map(|(d, v)| (*d, *v)).collect();

    for pair in points.windows(2) {
        let (start, v0) = pair[0];
        let (end, v1) = pair[1];
        let span = time::days_between(start, end) as f64;

        for day in time::daily_range(start, end) {
            let elapsed = time::days_between(start, day) as f64;
            filled.insert(day, v0 + (v1 - v0) * elapsed / span);
        }
    }

    // The last point (or the only one) is not covered by a window start
    if let Some((day, value)) = points.last() {
        filled.insert(*day, *value);
    }

    filled
}

/// Linear interpolation by position for interior gaps, then forward-fill,
/// then back-fill. An all-absent column stays absent.
pub fn fill_positional(values: &mut [Option<f64>]) {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return;
    };

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (Some(v0), Some(v1)) = (values[lo], values[hi]) else {
            continue;
        };
        let span = (hi - lo) as f64;
        for (offset, slot) in values[lo + 1..hi].iter_mut().enumerate() {
            let step = (offset + 1) as f64;
            *slot = Some(v0 + (v1 - v0) * step / span);
        }
    }

    // Forward-fill the tail, back-fill the head
    let tail = values[last];
    for slot in &mut values[last + 1..] {
        *slot = tail;
    }
    let head = values[first];
    for slot in &mut values[..first] {
        *slot = head;
    }
}

/// Align the three inputs of one city onto the survey calendar
pub fn align_daily(
    temperature: &[Reading],
    aqi: &[Reading],
    survey: &[SurveyRecord],
) -> Vec<AlignedRow> {
    let temp_daily = daily_means(temperature);
    let aqi_daily = interpolate_daily(&daily_means(aqi));

    let mut survey: Vec<&SurveyRecord> = survey.iter().collect();
    // Vec::sort_by_key is stable
    survey.sort_by_key(|record| record.date);

    let mut temps: Vec<Option<f64>> = survey
        .iter()
        .map(|r| temp_daily.get(&r.date).copied())
        .collect();
    let mut aqis: Vec<Option<f64>> = survey
        .iter()
        .map(|r| aqi_daily.get(&r.date).copied())
        .collect();

    fill_positional(&mut temps);
    fill_positional(&mut aqis);

    survey
        .into_iter()
        .zip(temps)
        .zip(aqis)
        .map(|((record, temp), aqi)| AlignedRow {
            date: record.date,
            temp,
            aqi,
            weather_satisfaction: record.weather_satisfaction,
            air_quality_satisfaction: record.air_quality_satisfaction,
        })
        .collect()
}
