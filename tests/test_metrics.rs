//! Integration test: cross-validated RMSE of the gradient boosting regressor

use house_rent::training::{
    rmse, rmse_cv_score, CrossValidator, GradientBoostingConfig, GradientBoostingRegressor,
};
use ndarray::{Array1, Array2};

fn regression_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 + j as f64);
    let y = x
        .rows()
        .into_iter()
        .map(|row| 2.0 * row[0] - 0.5 * row[1] + 0.1 * row[2])
        .collect();
    (x, y)
}

#[test]
fn test_constant_target_scores_zero_on_every_fold() {
    let (x, _) = regression_data(40);
    let y = Array1::from_elem(40, 3.0);
    let model = GradientBoostingRegressor::new(
        GradientBoostingConfig::default().with_n_estimators(5).with_random_state(0),
    );

    let results = rmse_cv_score(&model, &x, &y, &CrossValidator::k_fold(5)).unwrap();
    assert_eq!(results.n_folds, 5);
    assert!(results.scores.iter().all(|s| s.abs() < 1e-12));
    assert!(results.mean_score.abs() < 1e-12);
    assert!(results.std_score.abs() < 1e-12);
}

#[test]
fn test_more_rounds_fit_better() {
    let (x, y) = regression_data(80);
    let cv = CrossValidator::k_fold(4);

    let weak = GradientBoostingRegressor::new(
        GradientBoostingConfig::default().with_n_estimators(2).with_random_state(1),
    );
    let strong = GradientBoostingRegressor::new(
        GradientBoostingConfig::default().with_n_estimators(60).with_random_state(1),
    );

    let weak_score = rmse_cv_score(&weak, &x, &y, &cv).unwrap().mean_score;
    let strong_score = rmse_cv_score(&strong, &x, &y, &cv).unwrap().mean_score;
    assert!(strong_score < weak_score, "{} !< {}", strong_score, weak_score);
}

#[test]
fn test_cv_score_is_reproducible() {
    let (x, y) = regression_data(60);
    let cv = CrossValidator::k_fold(5);
    let model = GradientBoostingRegressor::new(
        GradientBoostingConfig::default()
            .with_n_estimators(10)
            .with_max_features(0.5)
            .with_random_state(42),
    );

    let first = rmse_cv_score(&model, &x, &y, &cv).unwrap();
    let second = rmse_cv_score(&model, &x, &y, &cv).unwrap();
    assert_eq!(first.scores, second.scores);
}

#[test]
fn test_mismatched_lengths_rejected() {
    let (x, _) = regression_data(20);
    let y = Array1::zeros(19);
    let model = GradientBoostingRegressor::new(GradientBoostingConfig::default());
    assert!(rmse_cv_score(&model, &x, &y, &CrossValidator::k_fold(5)).is_err());
}

#[test]
fn test_rmse_value() {
    let y_true = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let y_pred = Array1::from_vec(vec![1.0, 2.0, 3.0, 6.0]);
    assert!((rmse(&y_true, &y_pred).unwrap() - 1.0).abs() < 1e-12);
}
