//! Data preprocessing pipeline

use crate::error::{RentError, Result};
use super::{
    config::PreprocessingConfig,
    encoder::Encoder,
    imputer::Imputer,
    scaler::Scaler,
    to_array2, ColumnType,
};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Main data preprocessing pipeline.
///
/// Numeric columns are imputed then scaled; categorical columns are imputed
/// then one-hot encoded. The output always lists the numeric columns in input
/// order followed by the indicator columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: Option<Imputer>,
    categorical_imputer: Option<Imputer>,
    scaler: Option<Scaler>,
    encoder: Option<Encoder>,
    feature_names: Vec<String>,
    is_fitted: bool,
    /// Timing: seconds spent in last fit call
    fit_time: Option<f64>,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new preprocessor with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            config,
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            numeric_imputer: None,
            categorical_imputer: None,
            scaler: None,
            encoder: None,
            feature_names: Vec::new(),
            is_fitted: false,
            fit_time: None,
        }
    }

    fn detect_column_types(&mut self, df: &DataFrame) {
        self.numeric_columns.clear();
        self.categorical_columns.clear();
        for col in df.get_columns() {
            let name = col.name().to_string();
            match ColumnType::of(col.dtype()) {
                ColumnType::Numeric => self.numeric_columns.push(name),
                ColumnType::Categorical => self.categorical_columns.push(name),
            }
        }
    }

    /// Learn imputation, scaling and encoding state from `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();

        if df.height() == 0 {
            return Err(RentError::PreprocessingError("cannot fit on an empty frame".to_string()));
        }

        self.detect_column_types(df);
        let numeric: Vec<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> = self.categorical_columns.iter().map(String::as_str).collect();

        let mut imputer = Imputer::new(self.config.numeric_impute_strategy.clone());
        let imputed = imputer.fit_transform(df, &numeric)?;
        let mut scaler = Scaler::new(self.config.scaler_type.clone());
        scaler.fit(&imputed, &numeric)?;

        let mut cat_imputer = Imputer::new(self.config.categorical_impute_strategy.clone());
        let imputed = cat_imputer.fit_transform(&imputed, &categorical)?;
        let mut encoder = Encoder::new(self.config.max_categories);
        encoder.fit(&imputed, &categorical)?;

        self.feature_names = self
            .numeric_columns
            .iter()
            .cloned()
            .chain(encoder.feature_names())
            .collect();

        self.numeric_imputer = Some(imputer);
        self.scaler = Some(scaler);
        self.categorical_imputer = Some(cat_imputer);
        self.encoder = Some(encoder);
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());

        tracing::debug!(
            numeric = self.numeric_columns.len(),
            categorical = self.categorical_columns.len(),
            features = self.feature_names.len(),
            "preprocessor fitted"
        );
        Ok(self)
    }

    /// Apply the learned state. Extra columns in `df` are ignored.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RentError::ModelNotFitted);
        }

        let missing: Vec<&str> = self
            .numeric_columns
            .iter()
            .chain(&self.categorical_columns)
            .map(String::as_str)
            .filter(|name| df.column(name).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(RentError::FeatureNotFound(missing.join(", ")));
        }

        let mut result = df.clone();
        if let Some(ref imputer) = self.numeric_imputer {
            result = imputer.transform(&result)?;
        }
        if let Some(ref scaler) = self.scaler {
            result = scaler.transform(&result)?;
        }
        if let Some(ref imputer) = self.categorical_imputer {
            result = imputer.transform(&result)?;
        }
        if let Some(ref encoder) = self.encoder {
            result = encoder.transform(&result)?;
        }

        Ok(result.select(self.feature_names.iter().map(String::as_str))?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Transform straight into a feature matrix with columns in `feature_names` order
    pub fn transform_to_array(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let transformed = self.transform(df)?;
        to_array2(&transformed, &self.feature_names)
    }

    /// Output column names, available after fitting
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}
