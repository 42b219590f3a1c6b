//! PM2.5 to US AQI conversion
//!
//! Piecewise-linear mapping over the EPA 24-hour PM2.5 breakpoints. The
//! concentration is truncated (not rounded) to one decimal before lookup,
//! and the interpolated index is rounded half away from zero.

use thiserror::Error;

/// Highest index on the scale; concentrations above the table clamp here
pub const MAX_AQI: u16 = 500;

/// Guard against binary representation error during truncation,
/// e.g. `8.2 * 10.0` landing a hair below 82
const TRUNCATION_EPSILON: f64 = 1e-9;

/// AQI conversion errors
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AqiError {
    #[error("Negative PM2.5 concentration: {0}")]
    NegativeConcentration(f64),

    #[error("Non-finite PM2.5 concentration: {0}")]
    NonFinite(f64),
}

/// One row of the breakpoint table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiBreakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: u16,
    pub index_high: u16,
}

const fn bp(conc_low: f64, conc_high: f64, index_low: u16, index_high: u16) -> AqiBreakpoint {
    AqiBreakpoint {
        conc_low,
        conc_high,
        index_low,
        index_high,
    }
}

/// EPA PM2.5 breakpoints (µg/m³ → index). Contiguous on the 0.1 grid from
/// 0.0 to 500.4.
pub const PM25_BREAKPOINTS: [AqiBreakpoint; 7] = [
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 350.4, 301, 400),
    bp(350.5, 500.4, 401, 500),
];

impl AqiBreakpoint {
    fn contains(&self, concentration: f64) -> bool {
        self.conc_low <= concentration && concentration <= self.conc_high
    }

    fn interpolate(&self, concentration: f64) -> u16 {
        let slope = f64::from(self.index_high - self.index_low) / (self.conc_high - self.conc_low);
        let index = slope * (concentration - self.conc_low) + f64::from(self.index_low);
        index.round() as u16
    }
}

/// Truncate a concentration to one decimal digit
pub fn truncate_concentration(concentration: f64) -> f64 {
    (concentration * 10.0 + TRUNCATION_EPSILON).floor() / 10.0
}

/// Convert a PM2.5 concentration to the US AQI.
///
/// Negative or non-finite input is rejected. Concentrations above the last
/// breakpoint clamp to [`MAX_AQI`].
pub fn pm25_to_aqi(concentration: f64) -> Result<u16, AqiError> {
    if !concentration.is_finite() {
        return Err(AqiError::NonFinite(concentration));
    }
    if concentration < 0.0 {
        return Err(AqiError::NegativeConcentration(concentration));
    }

    let truncated = truncate_concentration(concentration);

    Ok(PM25_BREAKPOINTS
        .iter()
        .find(|b| b.contains(truncated))
        .map(|b| b.interpolate(truncated))
        .unwrap_or(MAX_AQI))
}

/// Optional-aware conversion: an absent reading stays absent
pub fn us_aqi(concentration: Option<f64>) -> Result<Option<u16>, AqiError> {
    concentration.map(pm25_to_aqi).transpose()
}

/// Health category bands of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_index(index: u16) -> Self {
        match index {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_boundaries() {
        let cases = [
            (0.0, 0),
            (12.0, 50),
            (12.1, 51),
            (35.4, 100),
            (35.5, 101),
            (55.4, 150),
            (55.5, 151),
            (150.4, 200),
            (150.5, 201),
            (250.4, 300),
            (250.5, 301),
            (350.4, 400),
            (350.5, 401),
            (500.4, 500),
        ];

        for (concentration, expected) in cases {
            assert_eq!(
                pm25_to_aqi(concentration).unwrap(),
                expected,
                "pm2.5 = {concentration}"
            );
        }
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // 12.09 truncates to 12.0 (index 50), rounding would give 12.1 (51)
        assert_eq!(pm25_to_aqi(12.09).unwrap(), 50);
        assert_eq!(pm25_to_aqi(35.49).unwrap(), 100);
        assert_eq!(truncate_concentration(8.2), 8.2);
        assert_eq!(truncate_concentration(8.29), 8.2);
    }

    #[test]
    fn test_interior_value() {
        // (100-51)/(35.4-12.1) * (20.0-12.1) + 51 = 67.61...
        assert_eq!(pm25_to_aqi(20.0).unwrap(), 68);
    }

    #[test]
    fn test_above_table_clamps() {
        assert_eq!(pm25_to_aqi(500.5).unwrap(), MAX_AQI);
        assert_eq!(pm25_to_aqi(9_999.0).unwrap(), MAX_AQI);
    }

    #[test]
    fn test_negative_is_error() {
        assert_eq!(
            pm25_to_aqi(-0.5),
            Err(AqiError::NegativeConcentration(-0.5))
        );
        assert!(pm25_to_aqi(f64::NAN).is_err());
        assert!(pm25_to_aqi(f64::INFINITY).is_err());
    }

    #[test]
    fn test_absent_stays_absent() {
        assert_eq!(us_aqi(None), Ok(None));
        assert_eq!(us_aqi(Some(12.0)), Ok(Some(50)));
        assert!(us_aqi(Some(-1.0)).is_err());
    }

    #[test]
    fn test_monotonic_over_grid() {
        let mut previous = 0;
        for tenth in 0..=5_100 {
            let concentration = f64::from(tenth) / 10.0;
            let index = pm25_to_aqi(concentration).unwrap();
            assert!(
                index >= previous,
                "index dropped at {concentration}: {index} < {previous}"
            );
            previous = index;
        }
        assert_eq!(previous, MAX_AQI);
    }

    #[test]
    fn test_breakpoints_contiguous() {
        for pair in PM25_BREAKPOINTS.windows(2) {
            let gap = pair[1].conc_low - pair[0].conc_high;
            assert!((gap - 0.1).abs() < 1e-9);
            assert_eq!(pair[1].index_low, pair[0].index_high + 1);
        }
    }

    #[test]
    fn test_category() {
        assert_eq!(AqiCategory::from_index(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_index(51), AqiCategory::Moderate);
        assert_eq!(
            AqiCategory::from_index(150),
            AqiCategory::UnhealthyForSensitiveGroups
        );
        assert_eq!(AqiCategory::from_index(500), AqiCategory::Hazardous);
    }
}
