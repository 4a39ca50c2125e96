//! Model store
//!
//! Packages a trained pipeline as a named, versioned serving entry:
//!
//! ```text
//! <root>/<name>/<version>/model.json
//! <root>/<name>/<version>/manifest.json
//! <root>/<name>/latest
//! ```
//!
//! Versions are UTC timestamp tags, so lexicographic order is save order.

use chrono::Utc;
use ndarray::{s, Array1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::{RentError, Result};
use crate::training::ModelPipeline;

const MODEL_FILE: &str = "model.json";
const MANIFEST_FILE: &str = "manifest.json";
const LATEST_FILE: &str = "latest";

/// A callable method exposed by a stored model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Method name, e.g. `predict`
    pub method: String,
    /// Whether several inputs may be concatenated into one call
    pub batchable: bool,
    /// Axis inputs are concatenated along
    pub batch_dim: usize,
}

impl Signature {
    /// Batchable `predict` over rows
    pub fn predict() -> Self {
        Self {
            method: "predict".to_string(),
            batchable: true,
            batch_dim: 0,
        }
    }
}

/// Description of one stored version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// RFC 3339 creation time
    pub created_at: String,
    pub signatures: Vec<Signature>,
    pub metadata: BTreeMap<String, String>,
    /// Output feature names of the packaged preprocessor
    pub feature_names: Vec<String>,
}

impl Manifest {
    pub fn signature(&self, method: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.method == method)
    }
}

/// A loaded model together with its manifest
#[derive(Debug, Clone)]
pub struct StoredModel {
    manifest: Manifest,
    model: ModelPipeline,
}

impl StoredModel {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.manifest.metadata
    }

    pub fn model(&self) -> &ModelPipeline {
        &self.model
    }

    fn checked_signature(&self, method: &str) -> Result<&Signature> {
        self.manifest.signature(method).ok_or_else(|| {
            RentError::ExportError(format!(
                "model '{}' has no '{}' signature",
                self.manifest.name, method
            ))
        })
    }

    /// Run a signature on one input
    pub fn call(&self, method: &str, input: &DataFrame) -> Result<Array1<f64>> {
        self.checked_signature(method)?;
        match method {
            "predict" => self.model.predict(input),
            other => Err(RentError::ExportError(format!("unsupported method '{}'", other))),
        }
    }

    /// Run a batchable signature on several inputs in one pass.
    ///
    /// Inputs are stacked along the signature's batch axis and the output is
    /// split back into one array per input.
    pub fn call_batched(&self, method: &str, inputs: &[DataFrame]) -> Result<Vec<Array1<f64>>> {
        let signature = self.checked_signature(method)?;
        if !signature.batchable || signature.batch_dim != 0 {
            return Err(RentError::ExportError(format!(
                "signature '{}' does not batch along rows",
                method
            )));
        }
        let Some((first, rest)) = inputs.split_first() else {
            return Ok(Vec::new());
        };

        let mut combined = first.clone();
        for frame in rest {
            combined.vstack_mut(frame)?;
        }
        let output = self.call(method, &combined)?;

        let mut offset = 0;
        let mut outputs = Vec::with_capacity(inputs.len());
        for frame in inputs {
            let rows = frame.height();
            outputs.push(output.slice(s![offset..offset + rows]).to_owned());
            offset += rows;
        }
        Ok(outputs)
    }
}

/// Directory-backed model store
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            RentError::ExportError(format!("Failed to create model store {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save a new version of `name` and point `latest` at it
    pub fn save(
        &self,
        name: &str,
        model: &ModelPipeline,
        signatures: Vec<Signature>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Manifest> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(RentError::ExportError(format!("invalid model name '{}'", name)));
        }

        let model_dir = self.root.join(name);
        let now = Utc::now();
        let stamp = now.format("%Y%m%d%H%M%S%3f").to_string();
        let mut version = stamp.clone();
        let mut suffix = 1;
        while model_dir.join(&version).exists() {
            version = format!("{}_{}", stamp, suffix);
            suffix += 1;
        }

        let version_dir = model_dir.join(&version);
        fs::create_dir_all(&version_dir)?;

        model.save(version_dir.join(MODEL_FILE))?;

        let manifest = Manifest {
            name: name.to_string(),
            version: version.clone(),
            created_at: now.to_rfc3339(),
            signatures,
            metadata,
            feature_names: model.feature_names().to_vec(),
        };
        let file = File::create(version_dir.join(MANIFEST_FILE))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &manifest)?;

        fs::write(model_dir.join(LATEST_FILE), &version)?;

        tracing::info!(model = name, version = %version, "model saved to store");
        Ok(manifest)
    }

    /// Version `latest` points at
    pub fn latest_version(&self, name: &str) -> Result<String> {
        let pointer = self.root.join(name).join(LATEST_FILE);
        let version = fs::read_to_string(&pointer)
            .map_err(|_| RentError::ExportError(format!("Model not found: {}", name)))?;
        Ok(version.trim().to_string())
    }

    /// Load the latest version of `name`
    pub fn load(&self, name: &str) -> Result<StoredModel> {
        let version = self.latest_version(name)?;
        self.load_version(name, &version)
    }

    /// Load a specific version of `name`
    pub fn load_version(&self, name: &str, version: &str) -> Result<StoredModel> {
        let version_dir = self.root.join(name).join(version);
        let manifest_path = version_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(RentError::ExportError(format!(
                "Version not found: {} {}",
                name, version
            )));
        }

        let file = File::open(&manifest_path)?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        let model = ModelPipeline::load(version_dir.join(MODEL_FILE))?;
        Ok(StoredModel { manifest, model })
    }

    /// List versions of a model, oldest first
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        let model_dir = self.root.join(name);
        if !model_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&model_dir)? {
            let entry = entry?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        versions.sort();
        Ok(versions)
    }
}
