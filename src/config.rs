//! Environment-driven configuration.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::covariates::{DEFAULT_FETCH_TIMEOUT, DEFAULT_WINDOW_DAYS};
use crate::training::TrainerConfig;

/// Examples required before a training run is attempted.
pub const DEFAULT_MIN_EXAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// SQLite database holding examples and models
    pub db_path: String,
    /// Name models are versioned under
    pub model_name: String,
    pub port: u16,
    pub fetch_timeout: Duration,
    pub covariate_window_days: u32,
    pub trainer: TrainerConfig,
    pub min_examples: usize,
    /// Trailing share of examples held out for validation metrics. 0 disables.
    pub holdout_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: "carbon.db".to_string(),
            model_name: "carbon_credits".to_string(),
            port: 3002,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            covariate_window_days: DEFAULT_WINDOW_DAYS,
            trainer: TrainerConfig::default(),
            min_examples: DEFAULT_MIN_EXAMPLES,
            holdout_fraction: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Reads `CARBON_*` variables, falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let trainer = TrainerConfig {
            epochs: env_or("CARBON_TRAIN_EPOCHS", defaults.trainer.epochs),
            learning_rate: env_or("CARBON_LEARNING_RATE", defaults.trainer.learning_rate),
            l2: env_or("CARBON_L2", defaults.trainer.l2),
            patience: env_or("CARBON_PATIENCE", defaults.trainer.patience),
            ..defaults.trainer.clone()
        };

        Self {
            db_path: env::var("CARBON_DB_PATH").unwrap_or(defaults.db_path),
            model_name: env::var("CARBON_MODEL_NAME").unwrap_or(defaults.model_name),
            port: env_or("CARBON_PORT", defaults.port),
            fetch_timeout: Duration::from_secs(env_or(
                "CARBON_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            covariate_window_days: env_or("CARBON_COVARIATE_WINDOW_DAYS", defaults.covariate_window_days),
            trainer,
            min_examples: env_or("CARBON_MIN_EXAMPLES", defaults.min_examples),
            holdout_fraction: env_or("CARBON_HOLDOUT_FRACTION", defaults.holdout_fraction),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Ignoring {}={:?} ({}), using {}", key, raw, e, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_parses_and_falls_back() {
        env::set_var("CARBON_TEST_EPOCHS_OK", "250");
        env::set_var("CARBON_TEST_EPOCHS_BAD", "lots");
        assert_eq!(env_or("CARBON_TEST_EPOCHS_OK", 10usize), 250);
        assert_eq!(env_or("CARBON_TEST_EPOCHS_BAD", 10usize), 10);
        assert_eq!(env_or("CARBON_TEST_EPOCHS_UNSET", 0.5f64), 0.5);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(8));
        assert_eq!(config.covariate_window_days, 30);
        assert_eq!(config.min_examples, 10);
        assert_eq!(config.holdout_fraction, 0.0);
    }
}
