//! Preprocessing and regressor bundled into one serializable model

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::models::FeatureImportance;
use crate::error::{RentError, Result};
use crate::preprocessing::DataPreprocessor;

/// A preprocessor and a gradient boosting regressor trained together.
///
/// The pipeline takes raw feature frames: `fit` learns the preprocessing
/// state and trains the regressor on the transformed matrix, `predict` runs
/// both stages on new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    preprocessor: DataPreprocessor,
    regressor: GradientBoostingRegressor,
}

impl ModelPipeline {
    pub fn new(preprocessor: DataPreprocessor, config: GradientBoostingConfig) -> Self {
        Self {
            preprocessor,
            regressor: GradientBoostingRegressor::new(config),
        }
    }

    /// Fit both stages on raw features and target
    pub fn fit(&mut self, df: &DataFrame, y: &Array1<f64>) -> Result<&mut Self> {
        let x = self.fit_preprocessor(df)?;
        self.regressor.fit(&x, y)?;
        Ok(self)
    }

    /// Fit only the preprocessing stage, returning the feature matrix
    pub fn fit_preprocessor(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.preprocessor.fit(df)?;
        self.preprocessor.transform_to_array(df)
    }

    /// Fit only the regressor on an already transformed matrix
    pub fn fit_regressor(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if !self.preprocessor.is_fitted() {
            return Err(RentError::ModelNotFitted);
        }
        if x.ncols() != self.preprocessor.feature_names().len() {
            return Err(RentError::ShapeError {
                expected: format!("{} features", self.preprocessor.feature_names().len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.regressor.fit(x, y)?;
        Ok(self)
    }

    /// Predict the (log-scale) target for raw feature rows
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform_to_array(df)?;
        self.regressor.predict(&x)
    }

    pub fn preprocessor(&self) -> &DataPreprocessor {
        &self.preprocessor
    }

    pub fn regressor(&self) -> &GradientBoostingRegressor {
        &self.regressor
    }

    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.feature_names()
    }

    /// Serialize to JSON at `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a pipeline written by [`ModelPipeline::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            RentError::SerializationError(format!("cannot read model {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl FeatureImportance for ModelPipeline {
    fn feature_importances(&self) -> Option<&[f64]> {
        FeatureImportance::feature_importances(&self.regressor)
    }
}
