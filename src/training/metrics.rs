//! Cross-validated RMSE

use ndarray::{Array1, Array2, Axis};

use super::cross_validation::{CVResults, CrossValidator};
use super::models::{Model, ModelMetrics};
use crate::error::{RentError, Result};

/// Root mean squared error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(ModelMetrics::compute_regression(y_true, y_pred)?.rmse)
}

/// Per-fold RMSE of `estimator` under k-fold cross-validation.
///
/// Every fold trains a fresh unfitted clone; `estimator` itself is left as is.
pub fn rmse_cv_score<M: Model>(
    estimator: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults> {
    if x.nrows() != y.len() {
        return Err(RentError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }

    let splits = cv.split(x.nrows())?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = estimator.clone_unfitted();
        model.fit(&x_train, &y_train)?;
        let score = rmse(&y_test, &model.predict(&x_test)?)?;

        tracing::debug!(fold = split.fold_idx, rmse = score, "cross-validation fold scored");
        scores.push(score);
    }

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
    use ndarray::array;

    /// Predicts the training mean; enough to exercise the fold loop
    #[derive(Default)]
    struct MeanModel {
        mean: Option<f64>,
    }

    impl Model for MeanModel {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.mean = y.mean();
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or(RentError::ModelNotFitted)?;
            Ok(Array1::from_elem(x.nrows(), mean))
        }

        fn clone_unfitted(&self) -> Self {
            Self::default()
        }

        fn name(&self) -> &'static str {
            "MeanModel"
        }
    }

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&array![0.0, 0.0], &array![3.0, 3.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_constant_target_scores_zero() {
        let x = Array2::from_shape_fn((20, 2), |(r, c)| (r + c) as f64);
        let y = Array1::from_elem(20, 3.0);

        let results = rmse_cv_score(&MeanModel::default(), &x, &y, &CrossValidator::k_fold(5)).unwrap();
        assert_eq!(results.scores, vec![0.0; 5]);
        assert_eq!(results.mean_score, 0.0);
        assert_eq!(results.std_score, 0.0);
    }

    #[test]
    fn test_estimator_left_unfitted() {
        let x = Array2::from_shape_fn((30, 2), |(r, c)| (r * (c + 1)) as f64);
        let y: Array1<f64> = (0..30).map(|v| v as f64).collect();
        let estimator = GradientBoostingRegressor::new(
            GradientBoostingConfig::default().with_n_estimators(5).with_random_state(0),
        );

        let results = rmse_cv_score(&estimator, &x, &y, &CrossValidator::default()).unwrap();
        assert_eq!(results.n_folds, 5);
        assert!(results.scores.iter().all(|s| s.is_finite() && *s >= 0.0));
        assert!(matches!(estimator.predict(&x), Err(RentError::ModelNotFitted)));
    }
}
