//! Experiment Tracking Module
//!
//! Provides MLflow-style experiment tracking backed by a local directory.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{ActiveRun, Experiment, ExperimentTracker, Metric, Run, RunStatus, MODEL_FILE};
