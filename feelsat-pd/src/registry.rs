//! City → model lookup
//!
//! Built once at startup, read-only afterwards. Cities whose sources fail
//! to load are logged and left out.

use std::collections::BTreeMap;

use feelsat_common::config::{CityConfig, ModelConfig};
use thiserror::Error;
use tracing::{error, info};

use crate::align::align_daily;
use crate::model::{ModelError, RegressorTrainer, SatisfactionModel, TrainingReport};
use crate::sources::{load_city_sources, SourceError};

#[derive(Debug, Error)]
pub enum CityTrainingError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    /// Keyed by lowercase city name
    models: BTreeMap<String, SatisfactionModel>,
    reports: Vec<TrainingReport>,
}

fn key(city: &str) -> String {
    city.trim().to_lowercase()
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: SatisfactionModel, report: TrainingReport) {
        self.models.insert(key(model.city()), model);
        self.reports.push(report);
    }

    /// Case-insensitive lookup
    pub fn get(&self, city: &str) -> Option<&SatisfactionModel> {
        self.models.get(&key(city))
    }

    /// Names of the registered cities
    pub fn cities(&self) -> Vec<String> {
        self.models.values().map(|m| m.city().to_string()).collect()
    }

    pub fn reports(&self) -> &[TrainingReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Load, align and train one city
    pub fn train_city(
        city: &CityConfig,
        trainer: &dyn RegressorTrainer,
        min_samples: usize,
    ) -> Result<(SatisfactionModel, TrainingReport), CityTrainingError> {
        let sources = load_city_sources(city)?;
        let rows = align_daily(&sources.temperature, &sources.aqi, &sources.survey);
        Ok(SatisfactionModel::train(&city.name, &rows, trainer, min_samples)?)
    }

    /// Train every city, city by city; failures skip the city
    pub fn train_all(cities: &[CityConfig], config: &ModelConfig) -> Self {
        let trainer = crate::model::trainer_for(config);
        let mut registry = Self::new();

        for city in cities {
            match Self::train_city(city, trainer.as_ref(), config.min_samples) {
                Ok((model, report)) => {
                    info!(
                        city = %city.name,
                        rows = report.rows,
                        complete_rows = report.complete_rows,
                        weather = ?report.weather,
                        air_quality = ?report.air_quality,
                        "City model ready"
                    );
                    registry.insert(model, report);
                }
                Err(e) => {
                    error!(city = %city.name, error = %e, "Skipping city");
                }
            }
        }

        registry
    }
}
