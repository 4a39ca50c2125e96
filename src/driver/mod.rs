//! Training driver
//!
//! Runs one training invocation end to end:
//!
//! ```text
//! LoadData -> FeatureEngineer -> PersistFeatures
//!          -> (Fit -> Evaluate -> Log) x grid size
//!          -> SelectBest -> Export
//! ```
//!
//! Every run is recorded in the experiment tracker. The run with the lowest
//! cross-validated RMSE across the whole experiment is copied into the
//! artifact directory and published to the model store.

use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{RunFailurePolicy, TrainConfig, DROPPED_COLUMNS, RMSE_METRIC, TARGET_COLUMN};
use crate::error::{RentError, Result};
use crate::export::{Manifest, ModelStore, Signature};
use crate::optimizer::ParamSet;
use crate::preprocessing::{numeric_values, DataPreprocessor};
use crate::tracking::{Experiment, ExperimentTracker, Run, RunStatus, MODEL_FILE};
use crate::training::{
    rmse_cv_score, CrossValidator, GradientBoostingConfig, Model, ModelPipeline,
};
use crate::utils::{DataLoader, DataSaver};
use crate::visualization::log_feature_importance;

/// Tag naming the estimator a run trained
pub const ESTIMATOR_TAG: &str = "estimator_name";
/// Artifact name of the logged pipeline
pub const MODEL_ARTIFACT: &str = "model";
/// Metric holding the per-fold RMSE standard deviation
pub const RMSE_STD_METRIC: &str = "RMSE_CV_std";
/// Metric series holding per-round training loss
pub const TRAIN_LOSS_METRIC: &str = "Train Loss";

/// Driver stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    LoadData,
    FeatureEngineer,
    PersistFeatures,
    Fit,
    Evaluate,
    Log,
    SelectBest,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadData => "load_data",
            Stage::FeatureEngineer => "feature_engineer",
            Stage::PersistFeatures => "persist_features",
            Stage::Fit => "fit",
            Stage::Evaluate => "evaluate",
            Stage::Log => "log",
            Stage::SelectBest => "select_best",
            Stage::Export => "export",
        };
        write!(f, "{}", name)
    }
}

/// Raw predictors, their fitted preprocessing and the log target
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Input columns left after removing the target and dropped columns
    pub raw: DataFrame,
    /// Preprocessor fitted on `raw`
    pub preprocessor: DataPreprocessor,
    /// Transformed feature frame
    pub features: DataFrame,
    /// `log1p(rent)`
    pub target: Array1<f64>,
}

impl FeatureSet {
    pub fn n_samples(&self) -> usize {
        self.target.len()
    }

    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.feature_names()
    }
}

/// Outcome of one grid run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_name: String,
    pub params: ParamSet,
    pub rmse_cv: f64,
    pub rmse_cv_std: f64,
    pub status: RunStatus,
}

/// Outcome of a full training invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub experiment: Experiment,
    pub features_path: PathBuf,
    pub n_samples: usize,
    pub runs: Vec<RunSummary>,
    /// Runs skipped under [`RunFailurePolicy::Skip`]
    pub failed_runs: usize,
    pub best_run: Run,
    pub manifest: Manifest,
    pub duration_secs: f64,
}

/// Grid-search training driver
pub struct TrainingDriver {
    config: TrainConfig,
    tracker: ExperimentTracker,
    stage: Stage,
}

impl TrainingDriver {
    /// Validate `config` and open the tracking store
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let tracker = ExperimentTracker::open(&config.paths.tracking_dir)?;
        Ok(Self {
            config,
            tracker,
            stage: Stage::LoadData,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ExperimentTracker {
        &self.tracker
    }

    /// Stage the driver is in, or failed in
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    /// Run every stage and publish the best model
    pub fn run(&mut self) -> Result<TrainingReport> {
        self.execute()
            .inspect_err(|e| tracing::error!(stage = %self.stage, error = %e, "training failed"))
    }

    /// Only load, engineer and persist features
    pub fn run_features(&mut self) -> Result<(FeatureSet, PathBuf)> {
        let result = self.prepare_features();
        result.inspect_err(|e| tracing::error!(stage = %self.stage, error = %e, "feature build failed"))
    }

    fn execute(&mut self) -> Result<TrainingReport> {
        let started = Instant::now();
        tracing::info!(
            experiment = %self.config.experiment_name,
            grid_size = self.config.grid.size(),
            n_estimators = self.config.n_estimators,
            cv_folds = self.config.cv_folds,
            policy = ?self.config.on_run_failure,
            "starting training"
        );

        let (features, features_path) = self.prepare_features()?;

        // names the first empty candidate list
        self.config.grid.validate()?;
        let param_sets = self.config.grid.expand();

        let experiment = self.tracker.set_experiment(&self.config.experiment_name)?;
        fs::create_dir_all(&self.config.paths.artifact_dir)?;
        let x = features.preprocessor.transform_to_array(&features.raw)?;

        let mut runs = Vec::with_capacity(param_sets.len());
        let mut failed_runs = 0;
        for (i, params) in param_sets.iter().enumerate() {
            let run_name = format!("Run {}", i);
            match self.execute_run(&experiment, &run_name, params, &features, &x) {
                Ok(summary) => runs.push(summary),
                Err(e) => match self.config.on_run_failure {
                    RunFailurePolicy::Abort => return Err(e),
                    RunFailurePolicy::Skip => {
                        failed_runs += 1;
                        tracing::warn!(run = %run_name, stage = %self.stage, error = %e, "run failed, skipping");
                    }
                },
            }
        }

        self.enter(Stage::SelectBest);
        let best_run = select_best(&self.tracker, &experiment)?;

        self.enter(Stage::Export);
        let manifest = self.export(&best_run)?;

        let duration_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            best_run = %best_run.run_name,
            version = %manifest.version,
            duration_secs,
            "training complete"
        );

        Ok(TrainingReport {
            experiment,
            features_path,
            n_samples: features.n_samples(),
            runs,
            failed_runs,
            best_run,
            manifest,
            duration_secs,
        })
    }

    fn prepare_features(&mut self) -> Result<(FeatureSet, PathBuf)> {
        self.enter(Stage::LoadData);
        let df = self.load_data()?;

        self.enter(Stage::FeatureEngineer);
        let mut features = engineer_features(&df)?;

        self.enter(Stage::PersistFeatures);
        let path = self.config.paths.features_csv();
        persist_features(&mut features, &path)?;
        Ok((features, path))
    }

    /// Read the raw training CSV
    pub fn load_data(&self) -> Result<DataFrame> {
        let path = self.config.paths.train_csv();
        tracing::info!(path = %path.display(), "loading training data");
        let df = DataLoader::new().load_csv(&path)?;
        if df.height() == 0 {
            return Err(RentError::DataError(format!("{} has no rows", path.display())));
        }
        Ok(df)
    }

    fn execute_run(
        &mut self,
        experiment: &Experiment,
        run_name: &str,
        params: &ParamSet,
        features: &FeatureSet,
        x: &ndarray::Array2<f64>,
    ) -> Result<RunSummary> {
        let mut run = self.tracker.start_run(experiment, run_name)?;
        tracing::info!(run = run_name, run_id = %run.run_id(), params = %params, "run started");

        self.enter(Stage::Fit);
        let mut gb_config = GradientBoostingConfig::default()
            .with_n_estimators(self.config.n_estimators)
            .with_random_state(self.config.random_state);
        gb_config.apply(params)?;
        let mut pipeline = ModelPipeline::new(features.preprocessor.clone(), gb_config);
        pipeline.fit_regressor(x, &features.target)?;

        self.enter(Stage::Evaluate);
        let cv = CrossValidator::k_fold(self.config.cv_folds);
        let scores = rmse_cv_score(pipeline.regressor(), x, &features.target, &cv)?;
        tracing::info!(
            "Cross-Validation RMSE score for {}: {:.4} (std = {:.4})",
            run_name,
            scores.mean_score,
            scores.std_score
        );

        self.enter(Stage::Log);
        let regressor = pipeline.regressor();
        run.set_tag(ESTIMATOR_TAG, regressor.name())?;
        let logged = regressor.get_params(params.keys())?;
        run.log_params(logged.to_string_map())?;
        run.log_metrics(
            [(RMSE_METRIC, scores.mean_score), (RMSE_STD_METRIC, scores.std_score)],
            0,
        )?;
        run.log_metric_series(TRAIN_LOSS_METRIC, regressor.train_score())?;
        run.log_model(MODEL_ARTIFACT, &pipeline)?;

        let artifact_dir = &self.config.paths.artifact_dir;
        if artifact_dir.is_dir() {
            run.log_artifact(artifact_dir, None)?;
        }
        if let Err(e) = log_feature_importance(&mut run, pipeline.feature_names(), &pipeline, artifact_dir) {
            tracing::warn!(run = run_name, error = %e, "could not log feature importance chart");
        }

        let record = run.finish(RunStatus::Finished)?;
        Ok(RunSummary {
            run_id: record.run_id,
            run_name: record.run_name,
            params: logged,
            rmse_cv: scores.mean_score,
            rmse_cv_std: scores.std_score,
            status: record.status,
        })
    }

    /// Copy the best run's model into the artifact directory and publish it
    fn export(&self, best_run: &Run) -> Result<Manifest> {
        let source = self.tracker.artifact_dir(best_run).join(MODEL_ARTIFACT);
        let artifact_dir = &self.config.paths.artifact_dir;
        copy_tree(&source, artifact_dir)?;

        let model = ModelPipeline::load(artifact_dir.join(MODEL_FILE))?;
        let store = ModelStore::open(&self.config.paths.model_store_dir)?;
        store.save(
            &self.config.model_name,
            &model,
            vec![Signature::predict()],
            best_run.params.clone(),
        )
    }
}

/// Finished run with the lowest `RMSE_CV` in `experiment`
pub fn select_best(tracker: &ExperimentTracker, experiment: &Experiment) -> Result<Run> {
    let best = tracker
        .search_runs(&experiment.experiment_id, RMSE_METRIC, true, None)?
        .into_iter()
        .find(|run| run.status == RunStatus::Finished)
        .ok_or_else(|| RentError::NoRuns {
            experiment: experiment.name.clone(),
        })?;

    let params = best
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!(run = %best.run_name, "Best Hyper-params: {{{}}}", params);
    Ok(best)
}

/// Split the raw frame into predictors and `log1p(rent)` and fit preprocessing.
///
/// The target column is required and may not hold missing values. Dropped
/// columns that are absent are tolerated.
pub fn engineer_features(df: &DataFrame) -> Result<FeatureSet> {
    let rent = numeric_values(df, TARGET_COLUMN).map_err(|_| {
        RentError::DataError(format!("target column '{}' is missing or not numeric", TARGET_COLUMN))
    })?;
    let target = rent
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if *v > -1.0 => Ok(v.ln_1p()),
            Some(v) => Err(RentError::DataError(format!("row {}: rent {} below -1", row, v))),
            None => Err(RentError::DataError(format!("row {}: rent is missing", row))),
        })
        .collect::<Result<Array1<f64>>>()?;

    let mut raw = df.drop(TARGET_COLUMN)?;
    for column in DROPPED_COLUMNS {
        if raw.get_column_index(column).is_some() {
            raw = raw.drop(column)?;
        } else {
            tracing::warn!(column, "expected column not present, nothing to drop");
        }
    }
    if raw.width() == 0 {
        return Err(RentError::DataError("no predictor columns left".to_string()));
    }

    let mut preprocessor = DataPreprocessor::new();
    let features = preprocessor.fit_transform(&raw)?;
    tracing::info!(
        rows = features.height(),
        features = features.width(),
        numeric = preprocessor.numeric_columns().len(),
        categorical = preprocessor.categorical_columns().len(),
        "features engineered"
    );

    Ok(FeatureSet {
        raw,
        preprocessor,
        features,
        target,
    })
}

/// Write the transformed features plus the log target as `rent`
pub fn persist_features(features: &mut FeatureSet, path: &Path) -> Result<()> {
    let mut frame = features.features.clone();
    frame.with_column(Column::new(TARGET_COLUMN.into(), features.target.to_vec()))?;
    DataSaver::save_csv(&mut frame, path)?;
    tracing::info!(path = %path.display(), rows = frame.height(), "features persisted");
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(RentError::ExportError(format!(
            "model artifact not found: {}",
            from.display()
        )));
    }
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
