//! Per-city satisfaction model
//!
//! Two independent regressors over `(temperature, aqi)`: weather
//! satisfaction and air-quality satisfaction. Predictions are clamped to
//! the 1–10 survey scale; a dimension without enough training data stays
//! untrained and predicts nothing.

use serde::Serialize;
use tracing::{info, warn};

use super::{r2_score, ModelError, Regressor, RegressorTrainer, TrainingSample, SCORE_MAX, SCORE_MIN};
use crate::align::AlignedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Weather,
    AirQuality,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weather => "weather_satisfaction",
            Self::AirQuality => "air_quality_satisfaction",
        }
    }

    fn label(&self, row: &AlignedRow) -> Option<f64> {
        match self {
            Self::Weather => row.weather_satisfaction,
            Self::AirQuality => row.air_quality_satisfaction,
        }
    }
}

/// Training result of one dimension
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionOutcome {
    Trained {
        samples: usize,
        /// In-sample R², diagnostic only
        r2: f64,
    },
    InsufficientSamples {
        count: usize,
    },
    /// Temperature or AQI has no values at all for this city
    MissingFeature,
}

impl DimensionOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Trained { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub city: String,
    pub trainer: &'static str,
    /// Aligned rows offered for training
    pub rows: usize,
    /// Rows with both satisfaction values and both features
    pub complete_rows: usize,
    pub weather: DimensionOutcome,
    pub air_quality: DimensionOutcome,
}

/// Bounded predictions; `None` for an untrained dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SatisfactionPrediction {
    pub weather_satisfaction: Option<f64>,
    pub air_quality_satisfaction: Option<f64>,
}

pub struct SatisfactionModel {
    city: String,
    weather: Option<Box<dyn Regressor>>,
    air_quality: Option<Box<dyn Regressor>>,
}

impl std::fmt::Debug for SatisfactionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatisfactionModel")
            .field("city", &self.city)
            .field("weather", &self.weather.is_some())
            .field("air_quality", &self.air_quality.is_some())
            .finish()
    }
}

impl SatisfactionModel {
    /// Fit both dimensions on aligned rows.
    ///
    /// Rows missing either satisfaction value or either feature are dropped
    /// first. Fewer than `min_samples` remaining rows leaves a dimension
    /// untrained.
    pub fn train(
        city: &str,
        rows: &[AlignedRow],
        trainer: &dyn RegressorTrainer,
        min_samples: usize,
    ) -> Result<(Self, TrainingReport), ModelError> {
        let mut model = Self {
            city: city.to_string(),
            weather: None,
            air_quality: None,
        };

        let missing_feature = !rows.is_empty()
            && (rows.iter().all(|r| r.temp.is_none()) || rows.iter().all(|r| r.aqi.is_none()));

        let complete: Vec<&AlignedRow> = rows
            .iter()
            .filter(|r| r.weather_satisfaction.is_some() && r.air_quality_satisfaction.is_some())
            .filter(|r| r.temp.is_some() && r.aqi.is_some())
            .collect();

        let mut report = TrainingReport {
            city: city.to_string(),
            trainer: trainer.name(),
            rows: rows.len(),
            complete_rows: complete.len(),
            weather: DimensionOutcome::MissingFeature,
            air_quality: DimensionOutcome::MissingFeature,
        };

        if missing_feature {
            warn!(city, "Temperature or AQI absent for every row, no models trained");
            return Ok((model, report));
        }

        for dimension in [Dimension::Weather, Dimension::AirQuality] {
            let samples: Vec<TrainingSample> = complete
                .iter()
                .filter_map(|row| {
                    Some(TrainingSample {
                        features: [row.temp?, row.aqi?],
                        label: dimension.label(row)?,
                    })
                })
                .collect();

            let outcome = if samples.len() < min_samples {
                warn!(
                    city,
                    dimension = dimension.name(),
                    count = samples.len(),
                    min_samples,
                    "Not enough samples, dimension left untrained"
                );
                DimensionOutcome::InsufficientSamples {
                    count: samples.len(),
                }
            } else {
                let regressor = trainer.fit(&samples).map_err(|e| ModelError::Training {
                    dimension: dimension.name(),
                    reason: e.to_string(),
                })?;

                let actual: Vec<f64> = samples.iter().map(|s| s.label).collect();
                let predicted: Vec<f64> =
                    samples.iter().map(|s| regressor.predict(s.features)).collect();
                let r2 = r2_score(&actual, &predicted);

                info!(
                    city,
                    dimension = dimension.name(),
                    samples = samples.len(),
                    r2,
                    "Trained satisfaction model"
                );

                match dimension {
                    Dimension::Weather => model.weather = Some(regressor),
                    Dimension::AirQuality => model.air_quality = Some(regressor),
                }
                DimensionOutcome::Trained {
                    samples: samples.len(),
                    r2,
                }
            };

            match dimension {
                Dimension::Weather => report.weather = outcome,
                Dimension::AirQuality => report.air_quality = outcome,
            }
        }

        Ok((model, report))
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// True when at least one dimension is trained
    pub fn is_trained(&self) -> bool {
        self.weather.is_some() || self.air_quality.is_some()
    }

    pub fn predict(&self, temperature: f64, aqi: f64) -> SatisfactionPrediction {
        SatisfactionPrediction {
            weather_satisfaction: self.predict_dimension(Dimension::Weather, temperature, aqi),
            air_quality_satisfaction: self.predict_dimension(
                Dimension::AirQuality,
                temperature,
                aqi,
            ),
        }
    }

    fn predict_dimension(&self, dimension: Dimension, temperature: f64, aqi: f64) -> Option<f64> {
        let regressor = match dimension {
            Dimension::Weather => self.weather.as_ref(),
            Dimension::AirQuality => self.air_quality.as_ref(),
        }?;

        let raw = regressor.predict([temperature, aqi]);
        if !raw.is_finite() {
            warn!(
                city = %self.city,
                dimension = dimension.name(),
                temperature,
                aqi,
                "Non-finite prediction discarded"
            );
            return None;
        }
        Some(raw.clamp(SCORE_MIN, SCORE_MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::linear::LinearTrainer;
    use chrono::NaiveDate;

    fn row(d: u32, temp: Option<f64>, aqi: Option<f64>, ws: Option<f64>, aqs: Option<f64>) -> AlignedRow {
        AlignedRow {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            temp,
            aqi,
            weather_satisfaction: ws,
            air_quality_satisfaction: aqs,
        }
    }

    fn complete_rows(n: u32) -> Vec<AlignedRow> {
        (1..=n)
            .map(|d| {
                let t = 10.0 + f64::from(d);
                let a = 200.0 - 3.0 * f64::from(d * d);
                row(d, Some(t), Some(a), Some(t / 4.0), Some(10.0 - a / 40.0))
            })
            .collect()
    }

    #[test]
    fn test_predictions_clamped() {
        let (model, report) =
            SatisfactionModel::train("Lahore", &complete_rows(8), &LinearTrainer, 5).unwrap();
        assert!(report.weather.is_trained());
        assert!(report.air_quality.is_trained());

        for (t, a) in [(1000.0, -50.0), (-1000.0, 5000.0), (20.0, 100.0)] {
            let p = model.predict(t, a);
            for value in [p.weather_satisfaction.unwrap(), p.air_quality_satisfaction.unwrap()] {
                assert!((1.0..=10.0).contains(&value), "{value} out of range");
            }
        }
    }

    #[test]
    fn test_rows_missing_satisfaction_dropped_jointly() {
        let mut rows = complete_rows(5);
        rows[0].air_quality_satisfaction = None;

        let (model, report) = SatisfactionModel::train("Lahore", &rows, &LinearTrainer, 5).unwrap();

        assert_eq!(report.complete_rows, 4);
        assert_eq!(report.weather, DimensionOutcome::InsufficientSamples { count: 4 });
        assert_eq!(
            report.air_quality,
            DimensionOutcome::InsufficientSamples { count: 4 }
        );
        assert!(!model.is_trained());
        assert_eq!(
            model.predict(20.0, 100.0),
            SatisfactionPrediction {
                weather_satisfaction: None,
                air_quality_satisfaction: None,
            }
        );
    }

    #[test]
    fn test_missing_feature_skips_city() {
        let rows: Vec<_> = complete_rows(6)
            .into_iter()
            .map(|mut r| {
                r.aqi = None;
                r
            })
            .collect();

        let (model, report) = SatisfactionModel::train("Karachi", &rows, &LinearTrainer, 5).unwrap();

        assert_eq!(report.weather, DimensionOutcome::MissingFeature);
        assert_eq!(report.air_quality, DimensionOutcome::MissingFeature);
        assert!(!model.is_trained());
    }

    #[test]
    fn test_no_rows_is_insufficient() {
        let (_, report) = SatisfactionModel::train("Lahore", &[], &LinearTrainer, 5).unwrap();
        assert_eq!(report.weather, DimensionOutcome::InsufficientSamples { count: 0 });
    }

    #[test]
    fn test_r2_recorded() {
        let (_, report) =
            SatisfactionModel::train("Lahore", &complete_rows(10), &LinearTrainer, 5).unwrap();

        match report.weather {
            DimensionOutcome::Trained { samples, r2 } => {
                assert_eq!(samples, 10);
                assert!((r2 - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    struct NanRegressor;

    impl Regressor for NanRegressor {
        fn predict(&self, _features: [f64; 2]) -> f64 {
            f64::NAN
        }
    }

    #[test]
    fn test_non_finite_prediction_is_none() {
        let model = SatisfactionModel {
            city: "Lahore".to_string(),
            weather: Some(Box::new(NanRegressor)),
            air_quality: None,
        };

        assert_eq!(model.predict(20.0, 100.0).weather_satisfaction, None);
    }
}
