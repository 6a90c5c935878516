//! Error taxonomy for the carbon pipeline.

use thiserror::Error;

/// Failures raised by a model/example store.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to (de)serialize stored document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("storage task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("model '{name}' already has version {version}")]
    VersionConflict { name: String, version: u32 },
}

/// Errors surfaced to callers of the pipeline.
///
/// Covariate lookups never produce one of these: a failing source is logged
/// and recorded as absent in the bundle instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("insufficient training examples: have {count}, need at least {required}")]
    InsufficientData { count: usize, required: usize },
    #[error("no trained model found for '{name}'")]
    NoModel { name: String },
    #[error("training failed: {0}")]
    Training(String),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Convenience type for `Result<T, PipelineError>`.
pub type PipelineResult<T> = Result<T, PipelineError>;
