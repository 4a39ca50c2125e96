//! Storage Backend for Experiment Tracking
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/run.json
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::tracker::{Experiment, Run};
use crate::error::{RentError, Result};

const META_FILE: &str = "meta.json";
const RUN_FILE: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Persist experiment metadata
    fn save_experiment(&self, experiment: &Experiment) -> Result<()>;

    /// Load every experiment's metadata
    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Persist a run record
    fn save_run(&self, run: &Run) -> Result<()>;

    /// Load one run record
    fn load_run(&self, experiment_id: &str, run_id: &str) -> Result<Run>;

    /// Load every run record of an experiment
    fn load_runs(&self, experiment_id: &str) -> Result<Vec<Run>>;

    /// Directory receiving a run's artifacts
    fn artifact_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf;
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend, creating the root if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            RentError::TrackingError(format!("cannot create {}: {}", base_dir.display(), e))
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.base_dir.join(experiment_id)
    }

    fn run_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment_id).join(run_id)
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiment(&self, experiment: &Experiment) -> Result<()> {
        let dir = self.experiment_dir(&experiment.experiment_id);
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(META_FILE), experiment)
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let mut experiments = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let meta = entry?.path().join(META_FILE);
            if meta.is_file() {
                experiments.push(read_json::<Experiment>(&meta)?);
            }
        }
        experiments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(experiments)
    }

    fn save_run(&self, run: &Run) -> Result<()> {
        let dir = self.run_dir(&run.experiment_id, &run.run_id);
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))?;
        write_json(&dir.join(RUN_FILE), run)
    }

    fn load_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        let path = self.run_dir(experiment_id, run_id).join(RUN_FILE);
        if !path.is_file() {
            return Err(RentError::TrackingError(format!(
                "run '{}' not found in experiment '{}'",
                run_id, experiment_id
            )));
        }
        read_json(&path)
    }

    fn load_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        let dir = self.experiment_dir(experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let record = entry?.path().join(RUN_FILE);
            if record.is_file() {
                runs.push(read_json::<Run>(&record)?);
            }
        }
        runs.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    fn artifact_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.run_dir(experiment_id, run_id).join(ARTIFACTS_DIR)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| RentError::TrackingError(format!("cannot write {}: {}", path.display(), e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| RentError::TrackingError(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&contents)?)
}
