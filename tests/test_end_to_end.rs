//! Integration test: full training run (load → features → grid → select → export)

use house_rent::config::{Paths, RunFailurePolicy, TrainConfig};
use house_rent::driver::{Stage, TrainingDriver, RMSE_STD_METRIC, TRAIN_LOSS_METRIC};
use house_rent::export::ModelStore;
use house_rent::optimizer::ParamGrid;
use house_rent::tracking::{ExperimentTracker, RunStatus};
use house_rent::utils::DataLoader;
use house_rent::visualization::IMPORTANCE_CHART;
use house_rent::RentError;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const CITIES: [&str; 4] = ["Kolkata", "Mumbai", "Bangalore", "Delhi"];
const FURNISHING: [&str; 3] = ["Unfurnished", "Semi-Furnished", "Furnished"];

fn rent_for(i: usize) -> f64 {
    let bhk = 1 + i % 4;
    let size = 400 + (i * 37) % 1600;
    let city_bonus = [1.0, 2.5, 1.6, 1.8][i % 4];
    ((size as f64 * 12.0 + bhk as f64 * 2500.0) * city_bonus).round()
}

fn write_listings(path: &Path, n: usize) {
    let mut csv = String::from(
        "posted_on,bhk,rent,size,area_locality,city,furnishing_status,bathroom\n",
    );
    for i in 0..n {
        // every seventh listing has no city
        let city = if i % 7 == 3 { "" } else { CITIES[i % 4] };
        csv.push_str(&format!(
            "2022-05-{:02},{},{},{},Locality {},{},{},{}\n",
            1 + i % 28,
            1 + i % 4,
            rent_for(i),
            400 + (i * 37) % 1600,
            i % 13,
            city,
            FURNISHING[i % 3],
            1 + i % 3,
        ));
    }
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, csv).unwrap();
}

fn small_config(root: &Path) -> TrainConfig {
    TrainConfig::new()
        .with_paths(Paths::under(root))
        .with_n_estimators(10)
        .with_cv_folds(3)
}

#[test]
fn test_single_param_set_publishes_model_with_params() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 100);

    let mut driver = TrainingDriver::new(config).unwrap();
    let report = driver.run().unwrap();

    assert_eq!(report.n_samples, 100);
    assert_eq!(report.runs.len(), 1);
    assert_eq!(report.failed_runs, 0);
    assert_eq!(report.runs[0].run_name, "Run 0");
    assert_eq!(report.best_run.run_name, "Run 0");

    let store = ModelStore::open(&paths.model_store_dir).unwrap();
    let stored = store.load("house_rent").unwrap();
    let expected: BTreeMap<String, String> = [
        ("learning_rate", "0.01"),
        ("max_depth", "3"),
        ("max_features", "1.0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(stored.metadata(), &expected);
    assert_eq!(stored.manifest().version, report.manifest.version);

    let signature = stored.manifest().signature("predict").unwrap();
    assert!(signature.batchable);
    assert_eq!(signature.batch_dim, 0);

    let raw = DataLoader::new().load_csv(paths.train_csv()).unwrap();
    let predictions = stored.call("predict", &raw).unwrap();
    assert_eq!(predictions.len(), 100);
    assert!(predictions.iter().all(|p| p.is_finite()));
}

#[test]
fn test_feature_csv_holds_log_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 100);

    let mut driver = TrainingDriver::new(config).unwrap();
    let (features, path) = driver.run_features().unwrap();
    assert_eq!(path, paths.features_csv());

    let saved = DataLoader::new().load_csv(&path).unwrap();
    assert_eq!(saved.height(), 100);
    assert_eq!(saved.width(), features.feature_names().len() + 1);
    assert!(saved.column("area_locality").is_err());
    assert!(saved.column("posted_on").is_err());

    let rent = saved.column("rent").unwrap().f64().unwrap();
    for (i, value) in rent.into_iter().enumerate() {
        let expected = rent_for(i).ln_1p();
        assert!((value.unwrap() - expected).abs() < 1e-9, "row {}", i);
    }
}

#[test]
fn test_runs_logged_with_metrics_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path())
        .with_grid(ParamGrid::new(vec![0.01, 0.1], vec![3], vec![1.0]));
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 100);

    let mut driver = TrainingDriver::new(config).unwrap();
    let report = driver.run().unwrap();
    assert_eq!(report.runs.len(), 2);

    let tracker = ExperimentTracker::open(&paths.tracking_dir).unwrap();
    let experiment = tracker.get_experiment_by_name("new_experiment").unwrap().unwrap();
    let runs = tracker.list_runs(&experiment.experiment_id).unwrap();
    assert_eq!(runs.len(), 2);

    for run in &runs {
        assert_eq!(run.status, RunStatus::Finished);
        assert_eq!(run.tags.get("estimator_name").map(String::as_str), Some("GradientBoostingRegressor"));
        assert_eq!(run.params.len(), 3);
        assert!(run.metrics.contains_key("RMSE_CV"));
        assert!(run.metrics.contains_key(RMSE_STD_METRIC));
        assert_eq!(run.metric_history(TRAIN_LOSS_METRIC).len(), 10);
        assert!(tracker.artifact_dir(run).join("model").join("model.json").is_file());
        assert!(tracker.artifact_dir(run).join(IMPORTANCE_CHART).is_file());
    }

    // the larger learning rate fits 10 rounds better
    let best = &report.best_run;
    assert_eq!(best.params.get("learning_rate").map(String::as_str), Some("0.1"));
    let best_rmse = best.metrics["RMSE_CV"];
    assert!(runs.iter().all(|r| r.metrics["RMSE_CV"] >= best_rmse));

    assert!(paths.artifact_dir.join("model.json").is_file());
    assert!(paths.artifact_dir.join(IMPORTANCE_CHART).is_file());
}

#[test]
fn test_selection_spans_previous_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::under(dir.path());
    write_listings(&paths.train_csv(), 100);

    let first = small_config(dir.path())
        .with_grid(ParamGrid::new(vec![0.1], vec![3], vec![1.0]));
    let first_report = TrainingDriver::new(first).unwrap().run().unwrap();

    let second = small_config(dir.path())
        .with_grid(ParamGrid::new(vec![0.01], vec![3], vec![1.0]));
    let second_report = TrainingDriver::new(second).unwrap().run().unwrap();

    assert_eq!(second_report.best_run.run_id, first_report.best_run.run_id);

    let store = ModelStore::open(&paths.model_store_dir).unwrap();
    assert_eq!(store.list("house_rent").unwrap().len(), 2);
    assert_eq!(
        store.load("house_rent").unwrap().metadata().get("learning_rate").map(String::as_str),
        Some("0.1")
    );
}

#[test]
fn test_missing_target_column_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let path = config.paths.train_csv();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "bhk,size,city\n2,1000,Kolkata\n3,1200,Mumbai\n").unwrap();

    let mut driver = TrainingDriver::new(config).unwrap();
    assert!(driver.run().is_err());
    assert!(!dir.path().join("model_store").join("house_rent").exists());
}

#[test]
fn test_predict_batched_matches_single_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 100);
    TrainingDriver::new(config).unwrap().run().unwrap();

    let stored = ModelStore::open(&paths.model_store_dir).unwrap().load("house_rent").unwrap();
    let raw: DataFrame = DataLoader::new().load_csv(paths.train_csv()).unwrap();
    let whole = stored.call("predict", &raw).unwrap();
    let parts = stored
        .call_batched("predict", &[raw.slice(0, 60), raw.slice(60, 40)])
        .unwrap();

    assert_eq!(parts[0].len(), 60);
    assert_eq!(parts[1].len(), 40);
    for (i, value) in parts.iter().flat_map(|p| p.iter()).enumerate() {
        assert!((value - whole[i]).abs() < 1e-12);
    }
}

#[test]
fn test_skip_policy_with_every_run_failing_finds_no_runs() {
    let dir = tempfile::tempdir().unwrap();
    // four listings cannot be split into five folds
    let config = TrainConfig::new()
        .with_paths(Paths::under(dir.path()))
        .with_n_estimators(5)
        .with_grid(ParamGrid::new(vec![0.01, 0.1], vec![3], vec![1.0]))
        .with_failure_policy(RunFailurePolicy::Skip);
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 4);

    let mut driver = TrainingDriver::new(config).unwrap();
    let err = driver.run().unwrap_err();
    assert!(matches!(&err, RentError::NoRuns { experiment } if experiment == "new_experiment"));
    assert_eq!(err.exit_code(), 2);

    let tracker = ExperimentTracker::open(&paths.tracking_dir).unwrap();
    let experiment = tracker.get_experiment_by_name("new_experiment").unwrap().unwrap();
    let runs = tracker.list_runs(&experiment.experiment_id).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Failed));
    assert!(!paths.model_store_dir.join("house_rent").exists());
}

#[test]
fn test_abort_policy_returns_the_run_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainConfig::new()
        .with_paths(Paths::under(dir.path()))
        .with_n_estimators(5)
        .with_grid(ParamGrid::new(vec![0.01, 0.1], vec![3], vec![1.0]))
        .with_failure_policy(RunFailurePolicy::Abort);
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 4);

    let mut driver = TrainingDriver::new(config).unwrap();
    let err = driver.run().unwrap_err();
    assert!(matches!(err, RentError::ValidationError(_)), "{}", err);
    assert_eq!(err.exit_code(), 1);
    assert_eq!(driver.stage(), Stage::Evaluate);

    // the second set never started
    let tracker = ExperimentTracker::open(&paths.tracking_dir).unwrap();
    let experiment = tracker.get_experiment_by_name("new_experiment").unwrap().unwrap();
    let runs = tracker.list_runs(&experiment.experiment_id).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_name, "Run 0");
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[test]
fn test_chart_failure_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let paths = config.paths.clone();
    write_listings(&paths.train_csv(), 100);
    // a directory where the chart file should go
    let blocked = paths.artifact_dir.join(IMPORTANCE_CHART);
    fs::create_dir_all(&blocked).unwrap();

    let mut driver = TrainingDriver::new(config).unwrap();
    let report = driver.run().unwrap();
    assert_eq!(report.failed_runs, 0);
    assert_eq!(report.runs[0].status, RunStatus::Finished);
    assert!(blocked.is_dir());

    let tracker = ExperimentTracker::open(&paths.tracking_dir).unwrap();
    let run = tracker
        .get_run(&report.experiment.experiment_id, &report.best_run.run_id)
        .unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert!(tracker.artifact_dir(&run).join("model").join("model.json").is_file());

    let store = ModelStore::open(&paths.model_store_dir).unwrap();
    assert_eq!(store.list("house_rent").unwrap().len(), 1);
}
