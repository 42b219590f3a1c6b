//! City-level series merger
//!
//! Fan-in reducer: every sensor series of a city collapses into one daily
//! series by same-day averaging. The result does not depend on the order in
//! which sensor series are supplied.

use feelsat_common::{Reading, Series};
use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Average all present readings per calendar day across `series`.
///
/// Days with no present reading in any input are omitted, never zero-filled.
/// Values of a day are summed in sorted order so the floating-point result
/// is identical for every permutation of the inputs.
pub fn merge_by_date_avg(series: &[Series]) -> Series {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

    for reading in series.iter().flat_map(|s| s.iter()) {
        if let Some(value) = reading.value {
            by_date.entry(reading.date).or_default().push(value);
        }
    }

    let readings = by_date
        .into_iter()
        .map(|(date, mut values)| {
            values.sort_by(f64::total_cmp);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Reading::present(date, mean)
        })
        .collect();

    // BTreeMap keys are unique and ascending
    Series::from_readings(readings).unwrap_or_default()
}
