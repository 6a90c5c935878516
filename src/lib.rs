//! Agro Carbon
//!
//! Carbon-credit yield estimation for farm plots with an online-learning loop:
//! - Closed-form soil/biomass carbon and credit heuristics
//! - Concurrent climate, solar and soil covariate lookups
//! - Fixed-schema feature vectors
//! - L2-regularized linear regression with early stopping
//! - Versioned, append-only model storage (SQLite or in-memory)

pub mod config;
pub mod error;
pub mod estimator;
pub mod covariates;
pub mod features;
pub mod training;
pub mod repository;
pub mod pipeline;
pub mod server;
pub mod utils;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, RepositoryError};
pub use estimator::{CarbonEstimate, EstimationRequest, Irrigation, ProjectCategory};
pub use covariates::{CovariateBundle, CovariateGatherer};
pub use features::{build_features, FEATURE_COUNT, FEATURE_NAMES};
pub use training::{LinearModel, TrainerConfig};
pub use repository::{InMemoryModelRepository, ModelRepository, SqliteModelRepository};
pub use pipeline::{CarbonPipeline, ExampleInput};
