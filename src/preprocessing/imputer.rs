//! Missing value imputation

use crate::error::{RentError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{numeric_values, string_values, ColumnType};

/// Fill value used for categorical columns that contain no values at all
const MISSING_CATEGORY: &str = "missing";

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the column mean
    Mean,
    /// Replace with the column median
    Median,
    /// Replace with the most frequent value; ties go to the smallest value
    MostFrequent,
}

/// Learned replacement for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

/// Missing value imputer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: Vec<(String, FillValue)>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn one fill value per column
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.fill_values.clear();

        for &name in columns {
            let dtype = df
                .column(name)
                .map_err(|_| RentError::FeatureNotFound(name.to_string()))?
                .dtype()
                .clone();

            let fill = match ColumnType::of(&dtype) {
                ColumnType::Numeric => {
                    let present: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
                    FillValue::Number(self.numeric_fill(&present))
                }
                ColumnType::Categorical => {
                    if self.strategy != ImputeStrategy::MostFrequent {
                        return Err(RentError::PreprocessingError(format!(
                            "{:?} imputation is undefined for categorical column '{}'",
                            self.strategy, name
                        )));
                    }
                    let present: Vec<String> = string_values(df, name)?.into_iter().flatten().collect();
                    FillValue::Text(
                        most_frequent(present.iter().map(String::as_str))
                            .unwrap_or(MISSING_CATEGORY)
                            .to_string(),
                    )
                }
            };

            tracing::trace!(column = name, fill = ?fill, "imputer fitted");
            self.fill_values.push((name.to_string(), fill));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing values in every fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RentError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (name, fill) in &self.fill_values {
            let filled = match fill {
                FillValue::Number(v) => {
                    let values: Vec<f64> = numeric_values(df, name)?
                        .into_iter()
                        .map(|x| x.unwrap_or(*v))
                        .collect();
                    Column::new(name.as_str().into(), values)
                }
                FillValue::Text(v) => {
                    let values: Vec<String> = string_values(df, name)?
                        .into_iter()
                        .map(|x| x.unwrap_or_else(|| v.clone()))
                        .collect();
                    Column::new(name.as_str().into(), values)
                }
            };
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Learned fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<&FillValue> {
        self.fill_values.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    fn numeric_fill(&self, present: &[f64]) -> f64 {
        if present.is_empty() {
            return 0.0;
        }
        match self.strategy {
            ImputeStrategy::Mean => present.iter().sum::<f64>() / present.len() as f64,
            ImputeStrategy::Median => {
                let mut sorted = present.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            ImputeStrategy::MostFrequent => {
                let mut sorted = present.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mut best = (sorted[0], 0usize);
                let mut run = (sorted[0], 0usize);
                for &v in &sorted {
                    if v == run.0 {
                        run.1 += 1;
                    } else {
                        run = (v, 1);
                    }
                    if run.1 > best.1 {
                        best = run;
                    }
                }
                best.0
            }
        }
    }
}

/// Most frequent value; ties resolve to the lexicographically smallest
pub(crate) fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (v, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((v, c)),
        })
        .map(|(v, _)| v)
}
