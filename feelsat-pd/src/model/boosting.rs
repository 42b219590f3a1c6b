//! Gradient-boosted trees
//!
//! Squared-error boosting from the `gbdt` crate. The booster always sees
//! every row and feature it is given; optional row subsampling happens
//! before fitting with a seeded RNG, so fits are reproducible.

use feelsat_common::config::ModelConfig;
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{check_samples, ModelError, Regressor, RegressorTrainer, TrainingSample};

const FEATURE_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct GbdtTrainer {
    pub iterations: usize,
    pub learning_rate: f64,
    pub max_depth: u32,
    pub min_leaf_size: usize,
    /// Fraction of rows used for fitting, in (0, 1]
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GbdtTrainer {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

impl GbdtTrainer {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            iterations: config.iterations,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            min_leaf_size: config.min_leaf_size,
            subsample: config.subsample,
            seed: config.seed,
        }
    }

    fn booster_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(FEATURE_COUNT);
        cfg.set_max_depth(self.max_depth);
        cfg.set_iterations(self.iterations);
        cfg.set_shrinkage(self.learning_rate as f32);
        cfg.set_loss("SquaredError");
        cfg.set_min_leaf_size(self.min_leaf_size.max(1));
        cfg.set_data_sample_ratio(1.0);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_training_optimization_level(2);
        cfg
    }

    /// Rows the booster is fitted on
    pub fn select_rows(&self, samples: &[TrainingSample]) -> Vec<TrainingSample> {
        if self.subsample >= 1.0 {
            return samples.to_vec();
        }

        let wanted = ((samples.len() as f64) * self.subsample).round() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        samples
            .choose_multiple(&mut rng, wanted.clamp(1, samples.len()))
            .copied()
            .collect()
    }
}

fn to_features(features: [f64; 2]) -> Vec<f32> {
    features.iter().map(|&f| f as f32).collect()
}

pub struct GbdtRegressor {
    model: GBDT,
}

impl Regressor for GbdtRegressor {
    fn predict(&self, features: [f64; 2]) -> f64 {
        let input: DataVec = vec![Data::new_test_data(to_features(features), None)];
        self.model
            .predict(&input)
            .first()
            .map(|&p| f64::from(p))
            .unwrap_or(f64::NAN)
    }
}

impl RegressorTrainer for GbdtTrainer {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&self, samples: &[TrainingSample]) -> Result<Box<dyn Regressor>, ModelError> {
        check_samples(samples)?;

        let mut data: DataVec = self
            .select_rows(samples)
            .into_iter()
            .map(|s| Data::new_training_data(to_features(s.features), 1.0, s.label as f32, None))
            .collect();

        let mut model = GBDT::new(&self.booster_config());
        model.fit(&mut data);

        tracing::debug!(
            rows = data.len(),
            iterations = self.iterations,
            "Fitted gradient boosting model"
        );

        Ok(Box::new(GbdtRegressor { model }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<TrainingSample> {
        (0..20)
            .map(|i| {
                let t = f64::from(i) * 2.0;
                let a = 40.0 + f64::from(i % 5) * 30.0;
                TrainingSample {
                    features: [t, a],
                    label: (8.0 - t / 10.0 - a / 100.0).clamp(1.0, 10.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_tracks_training_data() {
        let data = samples();
        let model = GbdtTrainer::default().fit(&data).unwrap();

        let mean_error: f64 = data
            .iter()
            .map(|s| (model.predict(s.features) - s.label).abs())
            .sum::<f64>()
            / data.len() as f64;
        assert!(mean_error < 1.0, "mean error {mean_error}");
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = samples();
        let trainer = GbdtTrainer {
            subsample: 0.7,
            ..GbdtTrainer::default()
        };

        let a = trainer.fit(&data).unwrap();
        let b = trainer.fit(&data).unwrap();

        for probe in [[0.0, 0.0], [25.0, 120.0], [60.0, 400.0]] {
            assert_eq!(a.predict(probe), b.predict(probe));
        }
    }

    #[test]
    fn test_subsample_uses_seed() {
        let data = samples();
        let trainer = GbdtTrainer {
            subsample: 0.5,
            ..GbdtTrainer::default()
        };

        let first = trainer.select_rows(&data);
        let second = trainer.select_rows(&data);

        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_samples_rejected() {
        assert!(GbdtTrainer::default().fit(&[]).is_err());
    }
}
