//! Gradient Boosting implementation
//!
//! Least-squares boosting over regression trees: every round fits a tree to
//! the current residuals and adds a shrunken copy of its prediction.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{FeatureImportance, Model};
use crate::error::{RentError, Result};
use crate::optimizer::{ParamSet, ParameterValue};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split an internal node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Fraction of features considered at each split
    pub max_features: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: 1.0,
            random_state: None,
        }
    }
}

impl GradientBoostingConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, fraction: f64) -> Self {
        self.max_features = fraction;
        self
    }

    pub fn with_subsample(mut self, ratio: f64) -> Self {
        self.subsample = ratio;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Overwrite the fields named in a parameter set
    pub fn apply(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            let invalid = |reason: &str| RentError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            };
            match name {
                "n_estimators" => {
                    self.n_estimators = value
                        .as_int()
                        .filter(|&v| v > 0)
                        .ok_or_else(|| invalid("expected a positive integer"))? as usize
                }
                "learning_rate" => {
                    self.learning_rate = value.as_float().ok_or_else(|| invalid("expected a number"))?
                }
                "max_depth" => {
                    self.max_depth = value
                        .as_int()
                        .filter(|&v| v > 0)
                        .ok_or_else(|| invalid("expected a positive integer"))? as usize
                }
                "min_samples_split" => {
                    self.min_samples_split = value
                        .as_int()
                        .filter(|&v| v >= 2)
                        .ok_or_else(|| invalid("expected an integer >= 2"))? as usize
                }
                "min_samples_leaf" => {
                    self.min_samples_leaf = value
                        .as_int()
                        .filter(|&v| v > 0)
                        .ok_or_else(|| invalid("expected a positive integer"))? as usize
                }
                "subsample" => {
                    self.subsample = value
                        .as_float()
                        .filter(|&v| v > 0.0 && v <= 1.0)
                        .ok_or_else(|| invalid("expected a fraction in (0, 1]"))?
                }
                "max_features" => {
                    self.max_features = value
                        .as_float()
                        .filter(|&v| v > 0.0 && v <= 1.0)
                        .ok_or_else(|| invalid("expected a fraction in (0, 1]"))?
                }
                "random_state" => {
                    self.random_state = Some(
                        value
                            .as_int()
                            .filter(|&v| v >= 0)
                            .ok_or_else(|| invalid("expected a non-negative integer"))? as u64,
                    )
                }
                _ => return Err(invalid("unknown gradient boosting parameter")),
            }
        }
        Ok(())
    }

    /// Current value of a named parameter
    pub fn get_param(&self, name: &str) -> Option<ParameterValue> {
        let value = match name {
            "n_estimators" => ParameterValue::from(self.n_estimators),
            "learning_rate" => ParameterValue::Float(self.learning_rate),
            "max_depth" => ParameterValue::from(self.max_depth),
            "min_samples_split" => ParameterValue::from(self.min_samples_split),
            "min_samples_leaf" => ParameterValue::from(self.min_samples_leaf),
            "subsample" => ParameterValue::Float(self.subsample),
            "max_features" => ParameterValue::Float(self.max_features),
            "random_state" => ParameterValue::Int(self.random_state? as i64),
            _ => return None,
        };
        Some(value)
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    train_score: Vec<f64>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            train_score: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Values of the named parameters, in the order asked for
    pub fn get_params<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<ParamSet> {
        let mut params = ParamSet::new();
        for name in names {
            let value = self.config.get_param(name).ok_or_else(|| RentError::InvalidParameter {
                name: name.to_string(),
                value: String::new(),
                reason: "not a gradient boosting parameter".to_string(),
            })?;
            params.insert(name, value);
        }
        Ok(params)
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(RentError::ShapeError {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RentError::TrainingError("cannot fit on an empty dataset".to_string()));
        }
        if self.config.n_estimators == 0 {
            return Err(RentError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        self.n_features = n_features;
        self.trees.clear();
        self.train_score.clear();

        // Initialize with mean
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.feature_importances = vec![0.0; n_features];

        for round in 0..self.config.n_estimators {
            let residuals = y - &predictions;
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let (x_fit, r_fit) = if sample_indices.len() == n_samples {
                (x.clone(), residuals)
            } else {
                (x.select(Axis(0), &sample_indices), residuals.select(Axis(0), &sample_indices))
            };

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(rng.gen());
            tree.fit(&x_fit, &r_fit)?;

            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            let loss = sample_indices
                .iter()
                .map(|&i| (y[i] - predictions[i]).powi(2))
                .sum::<f64>()
                / sample_indices.len() as f64;
            self.train_score.push(loss);
            tracing::trace!(round, loss, "boosting round");

            if let Some(tree_importance) = tree.feature_importances() {
                for (acc, imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *acc += imp;
                }
            }

            self.trees.push(tree);
        }

        // Normalize feature importances
        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(RentError::ModelNotFitted);
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    /// In-sample mean squared error after each boosting round
    pub fn train_score(&self) -> &[f64] {
        &self.train_score
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * self.config.subsample).ceil() as usize).clamp(1, n);
        let mut indices = rand::seq::index::sample(rng, n, sample_size).into_vec();
        indices.sort_unstable();
        indices
    }
}

impl Model for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingRegressor::predict(self, x)
    }

    fn clone_unfitted(&self) -> Self {
        Self::new(self.config.clone())
    }

    fn name(&self) -> &'static str {
        "GradientBoostingRegressor"
    }
}

impl FeatureImportance for GradientBoostingRegressor {
    fn feature_importances(&self) -> Option<&[f64]> {
        if self.trees.is_empty() {
            None
        } else {
            Some(&self.feature_importances)
        }
    }
}
