//! Model training module
//!
//! Provides the pieces the grid search is built from:
//! - Regression trees with parallel split search
//! - Least-squares gradient boosting
//! - K-fold cross-validation and cross-validated RMSE
//! - A serializable preprocessing + regressor pipeline

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod metrics;
mod models;
mod pipeline;

pub use cross_validation::{CVResults, CVSplit, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use metrics::{rmse, rmse_cv_score};
pub use models::{FeatureImportance, Model, ModelMetrics};
pub use pipeline::ModelPipeline;
