//! Carbon Pipeline
//!
//! The inbound operations: immediate estimates, example ingestion,
//! batch training and model-backed prediction. The repository and the
//! covariate gatherer are injected, so nothing here holds process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, DEFAULT_MIN_EXAMPLES};
use crate::covariates::{CovariateBundle, CovariateGatherer};
use crate::error::{PipelineError, PipelineResult};
use crate::estimator::{estimate_carbon, CarbonEstimate, EstimationRequest};
use crate::features::{build_features, FEATURE_COUNT, FEATURE_NAMES};
use crate::repository::{ModelDraft, ModelMetrics, ModelRepository, StoredModel, TrainingExample};
use crate::training::{evaluate, train_linear, FitMetrics, TrainerConfig};

/// What an example's features are derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExampleInput {
    /// Covariates are gathered for the request's location and features built from both.
    Request(EstimationRequest),
    /// A pre-built vector; must have exactly `FEATURE_COUNT` slots.
    Features(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestAck {
    pub id: String,
    pub example_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covariates: Option<CovariateBundle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    pub name: String,
    pub version: u32,
    pub rmse: f64,
    pub r2: f64,
    /// Rows the model was fitted on.
    pub training_count: usize,
    pub holdout_count: usize,
    pub epochs_run: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<FitMetrics>,
}

/// Metadata of a stored model, without its coefficients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub metrics: ModelMetrics,
    pub training_count: usize,
    pub feature_names: Vec<String>,
}

impl From<&StoredModel> for ModelInfo {
    fn from(stored: &StoredModel) -> Self {
        Self {
            name: stored.name.clone(),
            version: stored.version,
            created_at: stored.created_at,
            metrics: stored.metrics.clone(),
            training_count: stored.training_count,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub model_name: String,
    pub model_version: u32,
    pub predicted_credits_per_year: f64,
    pub features: Vec<f64>,
    pub covariates: CovariateBundle,
}

pub struct CarbonPipeline {
    repository: Arc<dyn ModelRepository>,
    gatherer: CovariateGatherer,
    trainer: TrainerConfig,
    model_name: String,
    min_examples: usize,
    holdout_fraction: f64,
    /// Serialises training runs within this process.
    train_lock: Mutex<()>,
}

impl CarbonPipeline {
    pub fn new(repository: Arc<dyn ModelRepository>, gatherer: CovariateGatherer) -> Self {
        Self {
            repository,
            gatherer,
            trainer: TrainerConfig::default(),
            model_name: PipelineConfig::default().model_name,
            min_examples: DEFAULT_MIN_EXAMPLES,
            holdout_fraction: 0.0,
            train_lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        repository: Arc<dyn ModelRepository>,
        gatherer: CovariateGatherer,
    ) -> Self {
        Self::new(repository, gatherer)
            .with_trainer_config(config.trainer.clone())
            .with_model_name(config.model_name.clone())
            .with_min_examples(config.min_examples)
            .with_holdout_fraction(config.holdout_fraction)
    }

    pub fn with_trainer_config(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_min_examples(mut self, min_examples: usize) -> Self {
        self.min_examples = min_examples.max(1);
        self
    }

    /// Clamped to [0, 0.5].
    pub fn with_holdout_fraction(mut self, fraction: f64) -> Self {
        self.holdout_fraction = if fraction.is_finite() { fraction.clamp(0.0, 0.5) } else { 0.0 };
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Deterministic formula estimate. Needs neither network nor storage.
    pub fn estimate(&self, request: &EstimationRequest) -> PipelineResult<CarbonEstimate> {
        request.validate()?;
        let estimate = estimate_carbon(request);
        debug!(
            category = %request.category,
            area_ha = request.area_ha,
            credits_per_year = estimate.credits_per_year,
            "Formula estimate"
        );
        Ok(estimate)
    }

    /// Appends one labelled example to the corpus.
    pub async fn ingest_example(
        &self,
        input: ExampleInput,
        label: f64,
        meta: Value,
    ) -> PipelineResult<IngestAck> {
        if !label.is_finite() {
            return Err(PipelineError::invalid(format!("label must be finite (got {})", label)));
        }

        let (features, covariates) = match input {
            ExampleInput::Request(request) => {
                request.validate()?;
                debug!(category = %request.category, "Ingesting request-derived example");
                let covariates = self.gatherer.gather(request.latitude, request.longitude).await;
                (build_features(&request, &covariates).to_vec(), Some(covariates))
            }
            ExampleInput::Features(features) => {
                if features.len() != FEATURE_COUNT {
                    return Err(PipelineError::DimensionMismatch {
                        expected: FEATURE_COUNT,
                        actual: features.len(),
                    });
                }
                if features.iter().any(|v| !v.is_finite()) {
                    return Err(PipelineError::invalid("feature values must be finite"));
                }
                (features, None)
            }
        };

        let example = TrainingExample::new(features, label, meta);
        let id = example.id.clone();
        self.repository.add_example(example).await?;
        let example_count = self.repository.count_examples().await?;
        info!(id = %id, example_count, "Training example ingested");

        Ok(IngestAck { id, example_count, covariates })
    }

    /// Trains a new model version on the whole corpus and commits it.
    pub async fn train(&self) -> PipelineResult<TrainingReport> {
        let _guard = self.train_lock.lock().await;

        let count = self.repository.count_examples().await?;
        if count < self.min_examples {
            warn!(count, required = self.min_examples, "Refusing to train on too few examples");
            return Err(PipelineError::InsufficientData {
                count,
                required: self.min_examples,
            });
        }

        let examples = self.repository.get_all_examples().await?;
        if examples.len() < self.min_examples {
            return Err(PipelineError::InsufficientData {
                count: examples.len(),
                required: self.min_examples,
            });
        }
        if let Some(bad) = examples.iter().find(|e| e.features.len() != FEATURE_COUNT) {
            return Err(PipelineError::DimensionMismatch {
                expected: FEATURE_COUNT,
                actual: bad.features.len(),
            });
        }

        let corpus_size = examples.len();
        let (features, labels): (Vec<Vec<f64>>, Vec<f64>) =
            examples.into_iter().map(|e| (e.features, e.label)).unzip();
        let holdout = holdout_size(corpus_size, self.holdout_fraction, self.min_examples);
        let fit_len = corpus_size - holdout;
        info!(corpus_size, fit_len, holdout, name = %self.model_name, "Starting training run");

        let config = self.trainer.clone();
        let (outcome, validation) = tokio::task::spawn_blocking(move || {
            let outcome = train_linear(&features[..fit_len], &labels[..fit_len], &config)?;
            let validation = if holdout > 0 {
                Some(evaluate(&outcome.model, &features[fit_len..], &labels[fit_len..])?)
            } else {
                None
            };
            Ok::<_, PipelineError>((outcome, validation))
        })
        .await
        .map_err(|e| PipelineError::Training(e.to_string()))??;

        let stored = self
            .repository
            .commit_model(ModelDraft {
                name: self.model_name.clone(),
                model: outcome.model,
                metrics: ModelMetrics {
                    rmse: outcome.metrics.rmse,
                    r2: outcome.metrics.r2,
                    epochs_run: outcome.epochs_run,
                    loss: outcome.loss,
                    holdout_count: holdout,
                    validation,
                },
                training_count: fit_len,
            })
            .await?;

        info!(
            name = %stored.name,
            version = stored.version,
            rmse = stored.metrics.rmse,
            r2 = stored.metrics.r2,
            "Training run committed"
        );

        Ok(TrainingReport {
            name: stored.name,
            version: stored.version,
            rmse: stored.metrics.rmse,
            r2: stored.metrics.r2,
            training_count: stored.training_count,
            holdout_count: stored.metrics.holdout_count,
            epochs_run: stored.metrics.epochs_run,
            validation: stored.metrics.validation,
        })
    }

    /// Latest model metadata, or `None` if nothing has been trained yet.
    pub async fn model_info(&self) -> PipelineResult<Option<ModelInfo>> {
        let latest = self.repository.get_latest_model(&self.model_name).await?;
        Ok(latest.as_ref().map(ModelInfo::from))
    }

    /// Applies the latest stored model to a request.
    pub async fn predict(&self, request: &EstimationRequest) -> PipelineResult<Prediction> {
        request.validate()?;
        let stored = self
            .repository
            .get_latest_model(&self.model_name)
            .await?
            .ok_or_else(|| PipelineError::NoModel {
                name: self.model_name.clone(),
            })?;

        let covariates = self.gatherer.gather(request.latitude, request.longitude).await;
        let features = build_features(request, &covariates);
        let predicted = stored.model.predict(&features)?;

        Ok(Prediction {
            model_name: stored.name,
            model_version: stored.version,
            predicted_credits_per_year: predicted,
            features: features.to_vec(),
            covariates,
        })
    }
}

/// Rows reserved for validation: at least one when enabled, never
/// shrinking the fit set below `min_fit`.
fn holdout_size(total: usize, fraction: f64, min_fit: usize) -> usize {
    if fraction <= 0.0 || total <= min_fit {
        return 0;
    }
    let wanted = ((total as f64) * fraction).floor().max(1.0) as usize;
    wanted.min(total - min_fit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holdout_size() {
        assert_eq!(holdout_size(20, 0.0, 10), 0);
        assert_eq!(holdout_size(20, 0.2, 10), 4);
        assert_eq!(holdout_size(12, 0.5, 10), 2);
        assert_eq!(holdout_size(10, 0.3, 10), 0);
        assert_eq!(holdout_size(11, 0.01, 10), 1);
    }
}
