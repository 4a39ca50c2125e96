//! Model traits and regression metrics

use crate::error::{RentError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regression scores for a set of predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of samples scored
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(RentError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(RentError::ValidationError("cannot score zero samples".to_string()));
        }

        let n = y_true.len() as f64;
        let mse = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n;
        let mae = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - mse * n / ss_tot } else { 0.0 };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        })
    }
}

/// Common interface for trainable regressors
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Fresh estimator with the same configuration and no learned state
    fn clone_unfitted(&self) -> Self
    where
        Self: Sized;

    /// Estimator name used for run tags
    fn name(&self) -> &'static str;
}

/// Models exposing per-feature importances
pub trait FeatureImportance {
    /// Importances in input feature order, `None` before fitting
    fn feature_importances(&self) -> Option<&[f64]>;
}
