//! CSV loading and saving

use crate::error::{RentError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// CSV loader
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Scan this many rows for type inference; `None` scans the whole file
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RentError::DataError(format!("cannot open {}: {}", path.display(), e)))?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file);

        let df = reader
            .finish()
            .map_err(|e| RentError::DataError(format!("cannot parse {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "csv loaded");
        Ok(df)
    }
}

/// Save DataFrames
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)
            .map_err(|e| RentError::DataError(format!("cannot create {}: {}", path.display(), e)))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| RentError::DataError(e.to_string()))
    }
}
