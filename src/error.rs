//! Error types for the rent model trainer

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, RentError>;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum RentError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Chart error: {0}")]
    ChartError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Parameter grid is empty: candidate list for '{0}' has no values")]
    EmptyGrid(String),

    #[error("Found no runs for experiment '{experiment}'")]
    NoRuns { experiment: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl RentError {
    /// Process exit code for a failure that reached the top-level boundary.
    pub fn exit_code(&self) -> u8 {
        match self {
            RentError::NoRuns { .. } => 2,
            _ => 1,
        }
    }
}

impl From<polars::error::PolarsError> for RentError {
    fn from(err: polars::error::PolarsError) -> Self {
        RentError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for RentError {
    fn from(err: serde_json::Error) -> Self {
        RentError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RentError {
    fn from(err: ndarray::ShapeError) -> Self {
        RentError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
