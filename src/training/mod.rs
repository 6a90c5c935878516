//! Regression Trainer
//!
//! Standardization, L2-regularized batch gradient descent with early
//! stopping, fit metrics, and the linear model used for prediction.

pub mod scaler;
pub mod model;
pub mod metrics;
pub mod trainer;

pub use scaler::Standardizer;
pub use model::LinearModel;
pub use metrics::{evaluate, r_squared, rmse, FitMetrics};
pub use trainer::{train_linear, TrainerConfig, TrainingOutcome};
