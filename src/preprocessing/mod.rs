//! Data preprocessing module
//!
//! Turns the raw rental listing table into a numeric feature table:
//! - Missing value imputation (mean/median for numbers, most frequent for text)
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns with a capped vocabulary
//!
//! Every stage keeps its learned state in column order, so fitting and
//! transforming the same frame always yields the same columns in the same
//! order.

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::Encoder;
pub use imputer::{FillValue, ImputeStrategy, Imputer};
pub use pipeline::DataPreprocessor;
pub use scaler::{Scaler, ScalerType};

use crate::error::{RentError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column data type for preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl ColumnType {
    /// Numbers and booleans are numeric; everything else is treated as a category
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean => ColumnType::Numeric,
            _ => ColumnType::Categorical,
        }
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| RentError::FeatureNotFound(name.to_string()))
}

/// Column values as `f64`; nulls and NaN come back as `None`
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let casted = column(df, name)?.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Column values as text; nulls come back as `None`
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = column(df, name)?.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Copy the named columns into a row-major matrix, in the order given
pub fn to_array2(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = numeric_values(df, name)?;
        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(matrix)
}
