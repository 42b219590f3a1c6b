//! Satisfaction models
//!
//! A regressor maps `(temperature, aqi)` to a raw score. Trainers produce
//! boxed regressors so the boosting and linear families are
//! interchangeable behind [`RegressorTrainer`].

pub mod boosting;
pub mod linear;
pub mod satisfaction;

use feelsat_common::config::{ModelConfig, ModelKind};
use linfa::prelude::SingleTargetRegression;
use ndarray::ArrayView1;
use thiserror::Error;

pub use boosting::GbdtTrainer;
pub use linear::LinearTrainer;
pub use satisfaction::{
    Dimension, DimensionOutcome, SatisfactionModel, SatisfactionPrediction, TrainingReport,
};

/// Lowest and highest satisfaction score
pub const SCORE_MIN: f64 = 1.0;
pub const SCORE_MAX: f64 = 10.0;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("No training samples")]
    NoSamples,

    #[error("Non-finite training value at row {0}")]
    NonFinite(usize),

    #[error("Fit failed: {0}")]
    Fit(String),

    #[error("{dimension} training failed: {reason}")]
    Training {
        dimension: &'static str,
        reason: String,
    },
}

/// One training row: features `[temperature, aqi]` and the target score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: [f64; 2],
    pub label: f64,
}

/// A fitted regression function
pub trait Regressor: Send + Sync {
    fn predict(&self, features: [f64; 2]) -> f64;
}

/// Fits a regressor on training samples
pub trait RegressorTrainer: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, samples: &[TrainingSample]) -> Result<Box<dyn Regressor>, ModelError>;
}

/// Trainer for the configured model family
pub fn trainer_for(config: &ModelConfig) -> Box<dyn RegressorTrainer> {
    match config.kind {
        ModelKind::GradientBoosting => Box::new(GbdtTrainer::from_config(config)),
        ModelKind::Linear => Box::new(LinearTrainer),
    }
}

/// Reject empty or non-finite training data
fn check_samples(samples: &[TrainingSample]) -> Result<(), ModelError> {
    if samples.is_empty() {
        return Err(ModelError::NoSamples);
    }
    match samples
        .iter()
        .position(|s| !s.label.is_finite() || s.features.iter().any(|f| !f.is_finite()))
    {
        Some(row) => Err(ModelError::NonFinite(row)),
        None => Ok(()),
    }
}

/// Coefficient of determination of `predicted` against `actual`; 0.0
/// without samples
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    let actual = ArrayView1::from(&actual[..n]);
    let predicted = ArrayView1::from(&predicted[..n]);
    predicted.r2(&actual).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_perfect_and_mean() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&actual, &actual) - 1.0).abs() < 1e-9);
        assert!(r2_score(&actual, &[2.5; 4]).abs() < 1e-9);
        assert!(r2_score(&actual, &[4.0, 3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_r2_without_samples() {
        assert_eq!(r2_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_check_samples() {
        assert!(matches!(check_samples(&[]), Err(ModelError::NoSamples)));

        let samples = [
            TrainingSample {
                features: [20.0, 50.0],
                label: 5.0,
            },
            TrainingSample {
                features: [f64::NAN, 50.0],
                label: 5.0,
            },
        ];
        assert!(matches!(check_samples(&samples), Err(ModelError::NonFinite(1))));
    }

    #[test]
    fn test_trainer_for_kind() {
        let mut config = ModelConfig::default();
        assert_eq!(trainer_for(&config).name(), "gradient_boosting");
        config.kind = ModelKind::Linear;
        assert_eq!(trainer_for(&config).name(), "linear");
    }
}
