//! Experiment Tracker Implementation
//!
//! Track experiments, runs, metrics, and artifacts in a directory-backed
//! store. Every change to a run is written through to its `run.json`, so an
//! interrupted process leaves a readable record behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage::{LocalStorage, StorageBackend};
use crate::error::{RentError, Result};

/// File name of a model logged with [`ActiveRun::log_model`]
pub const MODEL_FILE: &str = "model.json";

/// A single metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name
    pub name: String,
    /// Metric value
    pub value: f64,
    /// Step/iteration number
    pub step: u64,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

impl Metric {
    /// Create a new metric
    pub fn new(name: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            name: name.into(),
            value,
            step,
            timestamp: current_timestamp(),
        }
    }
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
    /// Run was killed/stopped
    Killed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

/// A run within an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run ID
    pub run_id: String,
    /// Run name
    pub run_name: String,
    /// Owning experiment
    pub experiment_id: String,
    /// Start time in milliseconds
    pub start_time: i64,
    /// End time (None if still running)
    pub end_time: Option<i64>,
    /// Parameters
    pub params: BTreeMap<String, String>,
    /// Latest value of every metric
    pub metrics: BTreeMap<String, f64>,
    /// Every logged metric value
    pub metrics_history: Vec<Metric>,
    /// Tags
    pub tags: BTreeMap<String, String>,
    /// Artifact paths relative to the run's artifact directory
    pub artifacts: Vec<String>,
    /// Status
    pub status: RunStatus,
}

impl Run {
    /// Create a new run
    pub fn new(experiment_id: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            experiment_id: experiment_id.into(),
            start_time: current_timestamp(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            metrics_history: Vec::new(),
            tags: BTreeMap::new(),
            artifacts: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Get run duration in seconds
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(current_timestamp);
        (end - self.start_time) as f64 / 1000.0
    }

    /// Logged history of one metric, in logging order
    pub fn metric_history(&self, name: &str) -> Vec<&Metric> {
        self.metrics_history.iter().filter(|m| m.name == name).collect()
    }
}

/// Experiment metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment ID
    pub experiment_id: String,
    /// Experiment name
    pub name: String,
    /// Creation time in milliseconds
    pub created_at: i64,
    /// Directory holding the experiment's runs
    pub artifact_location: PathBuf,
    /// Tags
    pub tags: BTreeMap<String, String>,
}

impl Experiment {
    /// Create a new experiment
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        artifact_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            created_at: current_timestamp(),
            artifact_location: artifact_location.into(),
            tags: BTreeMap::new(),
        }
    }
}

/// Experiment tracker
#[derive(Clone)]
pub struct ExperimentTracker {
    root: PathBuf,
    storage: Arc<dyn StorageBackend>,
}

impl ExperimentTracker {
    /// Open (or create) a tracking store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let storage = LocalStorage::new(&root)?;
        Ok(Self {
            root,
            storage: Arc::new(storage),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get an experiment by name
    pub fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .storage
            .load_experiments()?
            .into_iter()
            .find(|e| e.name == name))
    }

    /// Get or create the experiment called `name`
    pub fn set_experiment(&self, name: &str) -> Result<Experiment> {
        if let Some(existing) = self.get_experiment_by_name(name)? {
            return Ok(existing);
        }

        let next_id = self
            .storage
            .load_experiments()?
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .map_or(1, |id| id + 1)
            .to_string();

        let experiment = Experiment::new(&next_id, name, self.root.join(&next_id));
        self.storage.save_experiment(&experiment)?;
        tracing::info!(experiment = name, id = %next_id, "created experiment");
        Ok(experiment)
    }

    /// List all experiments
    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        self.storage.load_experiments()
    }

    /// Start a new run; the returned handle records everything logged to it
    pub fn start_run(&self, experiment: &Experiment, run_name: &str) -> Result<ActiveRun> {
        let run = Run::new(&experiment.experiment_id, run_name);
        self.storage.save_run(&run)?;
        tracing::debug!(run_id = %run.run_id, experiment = %experiment.name, "run started");
        Ok(ActiveRun {
            storage: Arc::clone(&self.storage),
            run,
            finished: false,
        })
    }

    /// Get one run
    pub fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        self.storage.load_run(experiment_id, run_id)
    }

    /// Every run of an experiment, oldest first
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        self.storage.load_runs(experiment_id)
    }

    /// Runs that logged `metric`, ordered by its latest value.
    ///
    /// Ties keep start order. Runs without the metric are left out.
    pub fn search_runs(
        &self,
        experiment_id: &str,
        metric: &str,
        ascending: bool,
        max_results: Option<usize>,
    ) -> Result<Vec<Run>> {
        let mut runs: Vec<(f64, Run)> = self
            .list_runs(experiment_id)?
            .into_iter()
            .filter_map(|run| run.metrics.get(metric).copied().map(|v| (v, run)))
            .collect();

        runs.sort_by(|a, b| {
            let ord = a.0.total_cmp(&b.0);
            if ascending { ord } else { ord.reverse() }
        });

        let mut runs: Vec<Run> = runs.into_iter().map(|(_, run)| run).collect();
        if let Some(limit) = max_results {
            runs.truncate(limit);
        }
        Ok(runs)
    }

    /// Artifact directory of a stored run
    pub fn artifact_dir(&self, run: &Run) -> PathBuf {
        self.storage.artifact_dir(&run.experiment_id, &run.run_id)
    }
}

/// Handle to a run in progress.
///
/// A handle dropped without [`ActiveRun::finish`] seals its run as `Failed`.
pub struct ActiveRun {
    storage: Arc<dyn StorageBackend>,
    run: Run,
    finished: bool,
}

impl ActiveRun {
    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    /// Snapshot of the run record
    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.storage.artifact_dir(&self.run.experiment_id, &self.run.run_id)
    }

    fn persist(&self) -> Result<()> {
        self.storage.save_run(&self.run)
    }

    /// Log a tag
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.run.tags.insert(key.into(), value.into());
        self.persist()
    }

    /// Log a parameter
    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) -> Result<()> {
        self.run.params.insert(key.into(), value.to_string());
        self.persist()
    }

    /// Log multiple parameters
    pub fn log_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: ToString,
    {
        for (k, v) in params {
            self.run.params.insert(k.into(), v.to_string());
        }
        self.persist()
    }

    /// Log a metric
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64, step: u64) -> Result<()> {
        self.record_metric(name.into(), value, step);
        self.persist()
    }

    /// Log multiple metrics at the same step
    pub fn log_metrics<K: Into<String>>(
        &mut self,
        metrics: impl IntoIterator<Item = (K, f64)>,
        step: u64,
    ) -> Result<()> {
        for (name, value) in metrics {
            self.record_metric(name.into(), value, step);
        }
        self.persist()
    }

    /// Log one metric per step, step = position in `values`
    pub fn log_metric_series(&mut self, name: &str, values: &[f64]) -> Result<()> {
        for (step, &value) in values.iter().enumerate() {
            self.record_metric(name.to_string(), value, step as u64);
        }
        self.persist()
    }

    fn record_metric(&mut self, name: String, value: f64, step: u64) {
        self.run.metrics.insert(name.clone(), value);
        self.run.metrics_history.push(Metric::new(name, value, step));
    }

    /// Copy a file or a directory tree into the run's artifacts.
    ///
    /// The copy lands under `artifact_path` when given, else at the artifact
    /// root. Returns the recorded artifact path.
    pub fn log_artifact(&mut self, local_path: impl AsRef<Path>, artifact_path: Option<&str>) -> Result<String> {
        let local_path = local_path.as_ref();
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RentError::TrackingError(format!("artifact path has no file name: {}", local_path.display()))
            })?;

        let relative = match artifact_path {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), file_name),
            None => file_name,
        };
        let target = self.artifact_dir().join(&relative);

        if local_path.is_dir() {
            copy_dir(local_path, &target)?;
        } else if local_path.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(local_path, &target)?;
        } else {
            return Err(RentError::TrackingError(format!(
                "artifact not found: {}",
                local_path.display()
            )));
        }

        if !self.run.artifacts.contains(&relative) {
            self.run.artifacts.push(relative.clone());
        }
        self.persist()?;
        Ok(relative)
    }

    /// Serialize a model into `<artifacts>/<name>/model.json`
    pub fn log_model<M: Serialize>(&mut self, name: &str, model: &M) -> Result<PathBuf> {
        let dir = self.artifact_dir().join(name);
        fs::create_dir_all(&dir)?;
        let path = dir.join(MODEL_FILE);
        fs::write(&path, serde_json::to_string(model)?)?;

        if !self.run.artifacts.iter().any(|a| a == name) {
            self.run.artifacts.push(name.to_string());
        }
        self.persist()?;
        Ok(dir)
    }

    /// Seal the run with a final status
    pub fn finish(mut self, status: RunStatus) -> Result<Run> {
        self.run.status = status;
        self.run.end_time = Some(current_timestamp());
        self.finished = true;
        self.persist()?;
        tracing::debug!(run_id = %self.run.run_id, %status, "run finished");
        Ok(self.run.clone())
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.run.status = RunStatus::Failed;
        self.run.end_time = Some(current_timestamp());
        if let Err(e) = self.persist() {
            tracing::error!(run_id = %self.run.run_id, error = %e, "could not seal abandoned run");
        } else {
            tracing::warn!(run_id = %self.run.run_id, "run dropped before finishing; marked failed");
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}
