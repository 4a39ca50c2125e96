//! House rent CLI Module
//!
//! Command-line interface for training, feature building, run inspection and
//! prediction.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Paths, RunFailurePolicy, TrainConfig, EXPERIMENT_NAME, MODEL_NAME, RMSE_METRIC};
use crate::driver::{TrainingDriver, RMSE_STD_METRIC};
use crate::export::ModelStore;
use crate::optimizer::ParamGrid;
use crate::tracking::{ExperimentTracker, RunStatus};
use crate::utils::{DataLoader, DataSaver};

/// Rows per batch when predicting
const PREDICT_BATCH: usize = 1024;
/// Output column holding predicted rent
const PREDICTION_COLUMN: &str = "predicted_rent";

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "house-rent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, track and package the house rent model")]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Experiment the runs are recorded under
    #[arg(long, global = true, env = "HOUSE_RENT_EXPERIMENT", default_value = EXPERIMENT_NAME)]
    pub experiment: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Filesystem layout
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Directory holding house_rent_train.csv
    #[arg(long, global = true, env = "HOUSE_RENT_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory receiving charts and the best model
    #[arg(long, global = true, env = "HOUSE_RENT_ARTIFACT_DIR", default_value = "./artifacts")]
    pub artifact_dir: PathBuf,

    /// Directory receiving logs.log
    #[arg(long, global = true, env = "HOUSE_RENT_LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,

    /// Experiment tracking store
    #[arg(long, global = true, env = "HOUSE_RENT_TRACKING_DIR", default_value = "./mlruns")]
    pub tracking_dir: PathBuf,

    /// Model store
    #[arg(long, global = true, env = "HOUSE_RENT_MODEL_STORE", default_value = "./model_store")]
    pub model_store_dir: PathBuf,
}

impl From<&PathArgs> for Paths {
    fn from(args: &PathArgs) -> Self {
        Paths {
            data_dir: args.data_dir.clone(),
            artifact_dir: args.artifact_dir.clone(),
            log_dir: args.log_dir.clone(),
            tracking_dir: args.tracking_dir.clone(),
            model_store_dir: args.model_store_dir.clone(),
        }
    }
}

/// Grid search options
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Learning rate candidates, comma separated
    #[arg(long, value_delimiter = ',', default_value = "0.01")]
    pub learning_rate: Vec<f64>,

    /// Maximum tree depth candidates, comma separated
    #[arg(long, value_delimiter = ',', default_value = "3")]
    pub max_depth: Vec<usize>,

    /// Per-split feature fraction candidates, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    pub max_features: Vec<f64>,

    /// Boosting rounds per model
    #[arg(long, default_value = "100")]
    pub n_estimators: usize,

    /// Number of cross-validation folds
    #[arg(long, default_value = "5")]
    pub cv_folds: usize,

    /// Seed for the regressor
    #[arg(long, default_value = "42")]
    pub random_state: u64,

    /// What to do when a run fails (abort, skip)
    #[arg(long, default_value = "abort")]
    pub on_run_failure: RunFailurePolicy,
}

impl Default for TrainArgs {
    fn default() -> Self {
        let grid = ParamGrid::default();
        let config = TrainConfig::default();
        Self {
            learning_rate: grid.learning_rate,
            max_depth: grid.max_depth,
            max_features: grid.max_features,
            n_estimators: config.n_estimators,
            cv_folds: config.cv_folds,
            random_state: config.random_state,
            on_run_failure: config.on_run_failure,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the grid search and publish the best model (default)
    Train(TrainArgs),

    /// Build and persist the engineered feature CSV only
    Features,

    /// List the experiment's runs, best first
    Runs,

    /// Predict rent with the published model
    Predict {
        /// Input CSV with the training columns
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV; prints a preview when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model store version; latest when omitted
        #[arg(long)]
        version: Option<String>,
    },
}

/// Build the training configuration from parsed arguments
pub fn train_config(paths: &PathArgs, experiment: &str, args: &TrainArgs) -> TrainConfig {
    let mut config = TrainConfig::new()
        .with_paths(paths.into())
        .with_experiment(experiment)
        .with_grid(ParamGrid::new(
            args.learning_rate.clone(),
            args.max_depth.clone(),
            args.max_features.clone(),
        ))
        .with_n_estimators(args.n_estimators)
        .with_cv_folds(args.cv_folds)
        .with_failure_policy(args.on_run_failure);
    config.random_state = args.random_state;
    config
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Train(args)) => cmd_train(&cli.paths, &cli.experiment, &args),
        None => cmd_train(&cli.paths, &cli.experiment, &TrainArgs::default()),
        Some(Commands::Features) => cmd_features(&cli.paths, &cli.experiment),
        Some(Commands::Runs) => cmd_runs(&cli.paths, &cli.experiment),
        Some(Commands::Predict { data, output, version }) => {
            cmd_predict(&cli.paths, &data, output.as_deref(), version.as_deref())
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(paths: &PathArgs, experiment: &str, args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = train_config(paths, experiment, args);
    tracing::debug!(config = %serde_json::to_string(&config)?, "training configuration");

    println!("  {}", kv("experiment", &config.experiment_name));
    println!("  {}", kv("grid size ", &config.grid.size().to_string()));
    println!("  {}", kv("cv folds  ", &config.cv_folds.to_string()));
    println!();

    step_run("Training");
    let start = Instant::now();
    let mut driver = TrainingDriver::new(config)?;
    let report = driver.run()?;
    step_done(&format!("{} runs in {:.1?}", report.runs.len(), start.elapsed()));

    section("Runs");
    for summary in &report.runs {
        println!(
            "  {:<10} {} {}  {}",
            summary.run_name,
            muted("RMSE_CV"),
            format!("{:.4}", summary.rmse_cv).white(),
            dim(&format!("± {:.4}  {}", summary.rmse_cv_std, summary.params)),
        );
    }
    if report.failed_runs > 0 {
        println!("  {}", format!("{} run(s) failed and were skipped", report.failed_runs).yellow());
    }

    section("Best");
    let best_rmse = report.best_run.metrics.get(RMSE_METRIC).copied().unwrap_or(f64::NAN);
    println!("  {}", kv("run     ", &report.best_run.run_name));
    println!("  {}", kv("RMSE_CV ", &format!("{:.4}", best_rmse)));
    for (name, value) in &report.best_run.params {
        println!("  {}", kv(&format!("{:<8}", name), value));
    }
    println!();
    step_ok(&format!(
        "saved {} version {}",
        report.manifest.name.cyan(),
        report.manifest.version
    ));
    println!();

    Ok(())
}

pub fn cmd_features(paths: &PathArgs, experiment: &str) -> anyhow::Result<()> {
    section("Features");

    let config = train_config(paths, experiment, &TrainArgs::default());
    step_run("Building features");
    let start = Instant::now();
    let mut driver = TrainingDriver::new(config)?;
    let (features, path) = driver.run_features()?;
    step_done(&format!(
        "{} rows × {} features in {:.1?}",
        features.n_samples(),
        features.feature_names().len(),
        start.elapsed()
    ));

    step_ok(&format!("written to {}", path.display()));
    println!();
    Ok(())
}

pub fn cmd_runs(paths: &PathArgs, experiment: &str) -> anyhow::Result<()> {
    section("Runs");

    let tracker = ExperimentTracker::open(&paths.tracking_dir)?;
    let Some(exp) = tracker.get_experiment_by_name(experiment)? else {
        anyhow::bail!("Experiment not found: {}", experiment);
    };

    let ranked = tracker.search_runs(&exp.experiment_id, RMSE_METRIC, true, None)?;
    let total = tracker.list_runs(&exp.experiment_id)?.len();

    for run in &ranked {
        let rmse = run.metrics.get(RMSE_METRIC).copied().unwrap_or(f64::NAN);
        let std = run.metrics.get(RMSE_STD_METRIC).copied();
        let status = match run.status {
            RunStatus::Finished => ok(&run.status.to_string()),
            _ => run.status.to_string().yellow(),
        };
        println!(
            "  {:<10} {:<9} {} {}  {}",
            run.run_name,
            status,
            muted("RMSE_CV"),
            format!("{:.4}", rmse).white(),
            dim(&std.map_or_else(String::new, |s| format!("± {:.4}", s))),
        );
    }

    println!();
    println!(
        "  {}",
        dim(&format!(
            "{} ranked, {} without {}",
            ranked.len(),
            total - ranked.len(),
            RMSE_METRIC
        ))
    );
    println!();
    Ok(())
}

pub fn cmd_predict(
    paths: &PathArgs,
    data_path: &Path,
    output: Option<&Path>,
    version: Option<&str>,
) -> anyhow::Result<()> {
    section("Predict");

    let store = ModelStore::open(&paths.model_store_dir)?;
    let model = match version {
        Some(v) => store.load_version(MODEL_NAME, v)?,
        None => store.load(MODEL_NAME)?,
    };
    step_ok(&format!("loaded {} version {}", MODEL_NAME.cyan(), model.manifest().version));

    step_run("Loading data");
    let mut df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Predicting");
    let start = Instant::now();
    let batches: Vec<DataFrame> = (0..df.height())
        .step_by(PREDICT_BATCH)
        .map(|offset| df.slice(offset as i64, PREDICT_BATCH))
        .collect();
    let predictions: Vec<f64> = model
        .call_batched("predict", &batches)?
        .into_iter()
        .flat_map(|batch| batch.into_iter().map(f64::exp_m1))
        .collect();
    step_done(&format!("{:.1?}", start.elapsed()));

    df.with_column(Column::new(PREDICTION_COLUMN.into(), predictions.clone()))?;

    match output {
        Some(path) => {
            DataSaver::save_csv(&mut df, path)?;
            step_ok(&format!("written to {}", path.display()));
        }
        None => {
            println!();
            for (i, value) in predictions.iter().take(10).enumerate() {
                println!("  {}", kv(&format!("row {:<4}", i), &format!("{:.2}", value)));
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
            }
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_train() {
        let cli = Cli::try_parse_from(["house-rent"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.experiment, "new_experiment");
    }

    #[test]
    fn test_train_grid_parsing() {
        let cli = Cli::try_parse_from([
            "house-rent",
            "train",
            "--learning-rate",
            "0.01,0.1",
            "--max-depth",
            "3,5",
            "--on-run-failure",
            "skip",
        ])
        .unwrap();

        let Some(Commands::Train(args)) = cli.command else {
            panic!("expected train command");
        };
        let config = train_config(&cli.paths, &cli.experiment, &args);
        assert_eq!(config.grid.size(), 4);
        assert_eq!(config.on_run_failure, RunFailurePolicy::Skip);
    }

    #[test]
    fn test_default_train_args_match_config() {
        let cli = Cli::try_parse_from(["house-rent", "train"]).unwrap();
        let Some(Commands::Train(parsed)) = cli.command else {
            panic!("expected train command");
        };
        let defaults = TrainArgs::default();
        assert_eq!(parsed.learning_rate, defaults.learning_rate);
        assert_eq!(parsed.max_depth, defaults.max_depth);
        assert_eq!(parsed.max_features, defaults.max_features);
        assert_eq!(parsed.n_estimators, defaults.n_estimators);
    }
}
