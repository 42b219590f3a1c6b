//! Ordinary least squares on `[1, temperature, aqi]`
//!
//! Fitted with `linfa-linear` on the normal equations. Solver failures and
//! non-finite parameters are fit errors; constant or collinear features can
//! cause either.

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use ndarray::{Array1, Array2};

use super::{check_samples, ModelError, Regressor, RegressorTrainer, TrainingSample};

/// Feature matrix and label vector of `samples`
pub fn design_matrix(samples: &[TrainingSample]) -> (Array2<f64>, Array1<f64>) {
    let records = Array2::from_shape_fn((samples.len(), 2), |(row, col)| samples[row].features[col]);
    let targets = samples.iter().map(|s| s.label).collect();
    (records, targets)
}

pub struct LinearRegressor {
    model: FittedLinearRegression<f64>,
}

impl LinearRegressor {
    pub fn intercept(&self) -> f64 {
        self.model.intercept()
    }

    /// `[temperature, aqi]` weights
    pub fn coefficients(&self) -> &Array1<f64> {
        self.model.params()
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: [f64; 2]) -> f64 {
        self.intercept() + self.coefficients().dot(&Array1::from(features.to_vec()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrainer;

impl LinearTrainer {
    pub fn fit_linear(&self, samples: &[TrainingSample]) -> Result<LinearRegressor, ModelError> {
        check_samples(samples)?;

        let (records, targets) = design_matrix(samples);
        let dataset = Dataset::new(records, targets);
        let model = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| ModelError::Fit(e.to_string()))?;

        if !model.intercept().is_finite() || model.params().iter().any(|p| !p.is_finite()) {
            return Err(ModelError::Fit("singular design matrix".to_string()));
        }

        Ok(LinearRegressor { model })
    }
}

impl RegressorTrainer for LinearTrainer {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(&self, samples: &[TrainingSample]) -> Result<Box<dyn Regressor>, ModelError> {
        Ok(Box::new(self.fit_linear(samples)?))
    }
}
