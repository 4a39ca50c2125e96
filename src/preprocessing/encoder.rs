//! One-hot encoding of categorical columns

use crate::error::{RentError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::string_values;

/// One-hot encoder with a per-column vocabulary.
///
/// The vocabulary holds at most `max_categories` values, the most frequent
/// first (ties by name), and is stored sorted. Values outside it, whether
/// unseen or infrequent, encode as a row of zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    max_categories: usize,
    vocabularies: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(max_categories: usize) -> Self {
        Self {
            max_categories,
            vocabularies: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the vocabulary of every column
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        if self.max_categories == 0 {
            return Err(RentError::InvalidParameter {
                name: "max_categories".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.vocabularies.clear();

        for &col_name in columns {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in string_values(df, col_name)?.into_iter().flatten() {
                *counts.entry(value).or_insert(0) += 1;
            }

            let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
            // stable sort keeps name order among equal counts
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            if ranked.len() > self.max_categories {
                tracing::debug!(
                    column = col_name,
                    categories = ranked.len(),
                    kept = self.max_categories,
                    "capping one-hot vocabulary"
                );
                ranked.truncate(self.max_categories);
            }

            let mut vocabulary: Vec<String> = ranked.into_iter().map(|(v, _)| v).collect();
            vocabulary.sort();
            self.vocabularies.push((col_name.to_string(), vocabulary));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(RentError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, vocabulary) in &self.vocabularies {
            let values = string_values(df, col_name)?;
            result = result.drop(col_name)?;

            for category in vocabulary {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                let name = Self::output_name(col_name, category);
                result.with_column(Column::new(name.into(), indicator))?;
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Names of the produced columns, per input column then per sorted category
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flat_map(|(col, vocab)| vocab.iter().map(move |cat| Self::output_name(col, cat)))
            .collect()
    }

    /// Learned vocabulary of a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.vocabularies
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_slice())
    }

    fn output_name(column: &str, category: &str) -> String {
        format!("{}_{}", column, category)
    }
}
