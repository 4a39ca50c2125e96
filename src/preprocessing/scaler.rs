//! Feature scaling implementations

use crate::error::{RentError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::numeric_values;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,    // mean or min
    scale: f64,     // population std or range
}

/// Feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();
        for &col_name in columns {
            let present: Vec<f64> = numeric_values(df, col_name)?.into_iter().flatten().collect();
            let params = self.compute_params(&present);
            self.params.push((col_name.to_string(), params));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data, replacing every fitted column in place
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RentError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, params) in &self.params {
            let scaled: Vec<Option<f64>> = numeric_values(df, col_name)?
                .into_iter()
                .map(|v| v.map(|x| (x - params.center) / params.scale))
                .collect();
            result.with_column(Column::new(col_name.as_str().into(), scaled))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Map a scaled value of `column` back to its original units
    pub fn inverse_value(&self, column: &str, value: f64) -> Option<f64> {
        self.params
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, p)| value * p.scale + p.center)
    }

    fn compute_params(&self, values: &[f64]) -> ScalerParams {
        if values.is_empty() {
            return ScalerParams { center: 0.0, scale: 1.0 };
        }
        let n = values.len() as f64;

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
            ScalerType::None => ScalerParams { center: 0.0, scale: 1.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler_population_std() {
        let df = df! { "size" => [1.0, 3.0] }.unwrap();

        let mut scaler = Scaler::new(ScalerType::Standard);
        let out = scaler.fit_transform(&df, &["size"]).unwrap();

        assert_eq!(numeric_values(&out, "size").unwrap(), vec![Some(-1.0), Some(1.0)]);
        assert_eq!(scaler.inverse_value("size", 1.0), Some(3.0));
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let df = df! { "bathroom" => [2.0, 2.0, 2.0] }.unwrap();

        let mut scaler = Scaler::new(ScalerType::Standard);
        let out = scaler.fit_transform(&df, &["bathroom"]).unwrap();

        assert_eq!(numeric_values(&out, "bathroom").unwrap(), vec![Some(0.0); 3]);
    }

    #[test]
    fn test_minmax_scaler() {
        let df = df! { "bhk" => [1.0, 2.0, 5.0] }.unwrap();

        let mut scaler = Scaler::new(ScalerType::MinMax);
        let out = scaler.fit_transform(&df, &["bhk"]).unwrap();

        assert_eq!(numeric_values(&out, "bhk").unwrap(), vec![Some(0.0), Some(0.25), Some(1.0)]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df! { "bhk" => [1.0] }.unwrap();
        assert!(matches!(Scaler::new(ScalerType::Standard).transform(&df), Err(RentError::ModelNotFitted)));
    }
}
