//! Daily readings and date-ordered series
//!
//! A [`Series`] holds the readings of one physical sensor or one city-level
//! signal. Dates are strictly increasing; construction rejects duplicates.

use chrono::NaiveDate;
use thiserror::Error;

/// Series construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("Duplicate date in series: {0}")]
    DuplicateDate(NaiveDate),
}

/// One calendar-day observation. `value` is `None` when the source recorded
/// the day without a usable number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Reading {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }

    /// Reading with a present value
    pub fn present(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
        }
    }
}

/// Date-ordered sequence of readings, strictly increasing by date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    readings: Vec<Reading>,
}

impl Series {
    /// Build a series from readings in any order.
    ///
    /// Readings are sorted by date. Two readings on the same date are
    /// rejected rather than silently merged.
    pub fn from_readings(mut readings: Vec<Reading>) -> Result<Self, SeriesError> {
        readings.sort_by_key(|r| r.date);

        if let Some(pair) = readings.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(pair[0].date));
        }

        Ok(Self { readings })
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn into_readings(self) -> Vec<Reading> {
        self.readings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of readings carrying a value
    pub fn present_count(&self) -> usize {
        self.readings.iter().filter(|r| r.value.is_some()).count()
    }

    /// First and last date covered, if any
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_from_readings_sorts_by_date() {
        let series = Series::from_readings(vec![
            Reading::present(day(3), 3.0),
            Reading::present(day(1), 1.0),
            Reading::new(day(2), None),
        ])
        .unwrap();

        let dates: Vec<_> = series.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert_eq!(series.present_count(), 2);
    }

    #[test]
    fn test_from_readings_rejects_duplicates() {
        let result = Series::from_readings(vec![
            Reading::present(day(5), 1.0),
            Reading::present(day(2), 1.0),
            Reading::present(day(5), 2.0),
        ]);

        assert_eq!(result, Err(SeriesError::DuplicateDate(day(5))));
    }

    #[test]
    fn test_date_span() {
        let series = Series::from_readings(vec![
            Reading::present(day(9), 1.0),
            Reading::present(day(4), 1.0),
        ])
        .unwrap();
        assert_eq!(series.date_span(), Some((day(4), day(9))));

        assert_eq!(Series::default().date_span(), None);
        assert!(Series::default().is_empty());
    }
}
