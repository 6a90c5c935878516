//! Model Repository
//!
//! Append-only storage for training examples and versioned models.
//! Two implementations: SQLite for deployments, in-memory for tests and
//! embedding.

pub mod sqlite;
pub mod memory;

pub use sqlite::SqliteModelRepository;
pub use memory::InMemoryModelRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::training::{FitMetrics, LinearModel};

pub type RepoResult<T> = Result<T, RepositoryError>;

/// One labelled observation. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingExample {
    pub id: String,
    pub features: Vec<f64>,
    /// Observed credits per year.
    pub label: f64,
    /// Caller-supplied provenance.
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

impl TrainingExample {
    pub fn new(features: Vec<f64>, label: f64, meta: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            features,
            label,
            meta,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetrics {
    pub rmse: f64,
    pub r2: f64,
    pub epochs_run: usize,
    /// MSE plus the L2 penalty at the retained weights.
    #[serde(default)]
    pub loss: f64,
    /// Examples held out of the fit and scored separately.
    #[serde(default)]
    pub holdout_count: usize,
    /// Present only when examples were held out of the fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FitMetrics>,
}

/// A trained model as persisted. Versions are never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredModel {
    pub name: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub model: LinearModel,
    pub metrics: ModelMetrics,
    /// Rows the coefficients were fitted on.
    pub training_count: usize,
}

/// A freshly trained model that has not been assigned a version yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDraft {
    pub name: String,
    pub model: LinearModel,
    pub metrics: ModelMetrics,
    pub training_count: usize,
}

#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Appends `model` as-is. Fails with `VersionConflict` if that version exists.
    async fn save_model(&self, model: StoredModel) -> RepoResult<()>;

    /// Assigns the next version and appends, atomically with respect to other commits.
    async fn commit_model(&self, draft: ModelDraft) -> RepoResult<StoredModel>;

    /// Highest (version, created_at) for `name`.
    async fn get_latest_model(&self, name: &str) -> RepoResult<Option<StoredModel>>;

    /// Not atomic; use `commit_model` when racing writers are possible.
    async fn next_version(&self, name: &str) -> RepoResult<u32> {
        Ok(self
            .get_latest_model(name)
            .await?
            .map_or(1, |m| m.version + 1))
    }

    async fn add_example(&self, example: TrainingExample) -> RepoResult<()>;

    /// All examples in insertion order.
    async fn get_all_examples(&self) -> RepoResult<Vec<TrainingExample>>;

    async fn count_examples(&self) -> RepoResult<usize>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn linear_model(dim: usize) -> LinearModel {
        LinearModel {
            coefficients: vec![0.5; dim],
            intercept: 1.0,
            feature_means: vec![0.0; dim],
            feature_std: vec![1.0; dim],
        }
    }

    pub fn stored(name: &str, version: u32) -> StoredModel {
        StoredModel {
            name: name.to_string(),
            version,
            created_at: Utc::now(),
            model: linear_model(3),
            metrics: ModelMetrics {
                rmse: 0.1,
                r2: 0.9,
                epochs_run: 100,
                loss: 0.01,
                holdout_count: 0,
                validation: None,
            },
            training_count: 12,
        }
    }

    pub fn draft(name: &str) -> ModelDraft {
        let s = stored(name, 0);
        ModelDraft {
            name: s.name,
            model: s.model,
            metrics: s.metrics,
            training_count: s.training_count,
        }
    }
}
