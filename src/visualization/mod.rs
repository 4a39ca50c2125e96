//! Visualization module: charts logged alongside training runs.

mod importance;

pub use importance::{log_feature_importance, plot_feature_importance, IMPORTANCE_CHART};
