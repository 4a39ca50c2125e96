//! Paths, constants and training configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RentError, Result};
use crate::optimizer::ParamGrid;

/// Raw training data file inside the data directory
pub const TRAIN_FILE: &str = "house_rent_train.csv";
/// Subdirectory of the data directory receiving engineered features
pub const STORAGE_DIR: &str = "storage";
/// Engineered feature file inside the storage directory
pub const FEATURES_FILE: &str = "house_rent_train_features.csv";
/// Log file name inside the log directory
pub const LOG_FILE: &str = "logs.log";
/// Target column
pub const TARGET_COLUMN: &str = "rent";
/// Columns removed before feature engineering
pub const DROPPED_COLUMNS: [&str; 2] = ["area_locality", "posted_on"];
/// Default experiment name
pub const EXPERIMENT_NAME: &str = "new_experiment";
/// Model store entry name
pub const MODEL_NAME: &str = "house_rent";
/// Metric used to rank runs
pub const RMSE_METRIC: &str = "RMSE_CV";

/// Filesystem layout used by the trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Directory holding the raw CSV
    pub data_dir: PathBuf,
    /// Directory receiving charts and the best model's artifacts
    pub artifact_dir: PathBuf,
    /// Directory receiving the log file
    pub log_dir: PathBuf,
    /// Root of the experiment tracking store
    pub tracking_dir: PathBuf,
    /// Root of the model store
    pub model_store_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            artifact_dir: PathBuf::from("./artifacts"),
            log_dir: PathBuf::from("./logs"),
            tracking_dir: PathBuf::from("./mlruns"),
            model_store_dir: PathBuf::from("./model_store"),
        }
    }
}

impl Paths {
    /// Lay every directory out under a single root
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            artifact_dir: root.join("artifacts"),
            log_dir: root.join("logs"),
            tracking_dir: root.join("mlruns"),
            model_store_dir: root.join("model_store"),
        }
    }

    pub fn train_csv(&self) -> PathBuf {
        self.data_dir.join(TRAIN_FILE)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join(STORAGE_DIR)
    }

    pub fn features_csv(&self) -> PathBuf {
        self.storage_dir().join(FEATURES_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }
}

/// What the grid loop does when a single run fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunFailurePolicy {
    /// Abort the whole search on the first failing run
    #[default]
    Abort,
    /// Mark the run failed, log it and continue with the next parameter set
    Skip,
}

impl std::str::FromStr for RunFailurePolicy {
    type Err = RentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(RunFailurePolicy::Abort),
            "skip" | "continue" => Ok(RunFailurePolicy::Skip),
            other => Err(RentError::ConfigError(format!(
                "unknown run failure policy '{}', expected 'abort' or 'skip'",
                other
            ))),
        }
    }
}

/// Configuration for one training invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub paths: Paths,
    /// Experiment the runs are recorded under
    pub experiment_name: String,
    /// Model store entry receiving the winner
    pub model_name: String,
    /// Hyperparameter candidates
    pub grid: ParamGrid,
    /// Boosting rounds per model
    pub n_estimators: usize,
    /// Cross-validation folds
    pub cv_folds: usize,
    /// Seed for every random component
    pub random_state: u64,
    pub on_run_failure: RunFailurePolicy,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            experiment_name: EXPERIMENT_NAME.to_string(),
            model_name: MODEL_NAME.to_string(),
            grid: ParamGrid::default(),
            n_estimators: 100,
            cv_folds: 5,
            random_state: 42,
            on_run_failure: RunFailurePolicy::Abort,
        }
    }
}

impl TrainConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the filesystem layout
    pub fn with_paths(mut self, paths: Paths) -> Self {
        self.paths = paths;
        self
    }

    /// Builder method to set the experiment name
    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Builder method to set the parameter grid
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Builder method to set boosting rounds
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Builder method to set the number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the failure policy
    pub fn with_failure_policy(mut self, policy: RunFailurePolicy) -> Self {
        self.on_run_failure = policy;
        self
    }

    /// Reject configurations the driver cannot run
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(RentError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.cv_folds.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.n_estimators == 0 {
            return Err(RentError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.experiment_name.trim().is_empty() {
            return Err(RentError::ConfigError("experiment name is empty".to_string()));
        }
        self.grid.validate()
    }
}
