//! House rent model training
//!
//! Trains a gradient boosting regressor on house rent listings:
//! - Feature engineering with imputation, one-hot encoding and scaling
//! - Exhaustive hyperparameter grid search scored by cross-validated RMSE
//! - Directory-backed experiment tracking of params, metrics and artifacts
//! - Packaging of the best run into a versioned model store
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Imputation, encoding, scaling
//! - [`training`] - Gradient boosting, cross-validation, model pipeline
//! - [`optimizer`] - Parameter grids
//!
//! ## Infrastructure
//! - [`tracking`] - Experiment tracking
//! - [`visualization`] - Feature importance charts
//! - [`export`] - Model store
//! - [`driver`] - The training state machine
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;
pub mod logging;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod optimizer;

// Infrastructure
pub mod tracking;
pub mod visualization;
pub mod export;
pub mod driver;
pub mod utils;

// Services
pub mod cli;

pub use error::{RentError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{RentError, Result};

    // Configuration
    pub use crate::config::{Paths, RunFailurePolicy, TrainConfig};

    // Preprocessing
    pub use crate::preprocessing::{DataPreprocessor, PreprocessingConfig};

    // Training
    pub use crate::training::{
        CrossValidator, GradientBoostingConfig, GradientBoostingRegressor, ModelPipeline,
    };

    // Optimization
    pub use crate::optimizer::{ParamGrid, ParamSet, ParameterValue};

    // Experiment tracking
    pub use crate::tracking::{ExperimentTracker, Experiment, Run, RunStatus};

    // Export
    pub use crate::export::{ModelStore, Signature, StoredModel};

    // Driver
    pub use crate::driver::{TrainingDriver, TrainingReport};
}
