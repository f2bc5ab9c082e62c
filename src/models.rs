//! Model specification and resolution
//!
//! A segmentation model is a directory holding a SAM-style ONNX pair:
//! `encoder.onnx` (image to embeddings) and `decoder.onnx` (embeddings plus
//! point prompt to candidate masks). The directory comes either from the
//! download cache or from an explicit local path.

use crate::cache::ModelCache;
use crate::error::{ObjcutError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Image encoder file inside a model directory
pub const ENCODER_FILE: &str = "encoder.onnx";

/// Prompt decoder file inside a model directory
pub const DECODER_FILE: &str = "decoder.onnx";

/// Where a model comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Model downloaded into the cache, referenced by its id
    Downloaded(String),
    /// Explicit local model directory
    Path(PathBuf),
}

impl ModelSource {
    /// Interpret a CLI-style string: existing directories as paths, URLs by
    /// their cache id, anything else as a cache id verbatim
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let path = Path::new(input);
        if path.is_dir() {
            return Self::Path(path.to_path_buf());
        }
        if input.starts_with("https://") || input.starts_with("http://") {
            return Self::Downloaded(ModelCache::url_to_model_id(input));
        }
        Self::Downloaded(input.to_string())
    }
}

/// Specification of which model to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model source (cache id or local directory)
    pub source: ModelSource,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Downloaded(ModelCache::default_model_id()),
        }
    }
}

/// Resolves a [`ModelSpec`] to a validated on-disk model directory
#[derive(Debug, Clone)]
pub struct ModelManager {
    model_dir: PathBuf,
}

impl ModelManager {
    /// Resolve a model specification against the cache or filesystem
    ///
    /// # Errors
    /// - Cache initialization failures
    /// - Model directory missing or lacking the encoder/decoder files
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let model_dir = match &spec.source {
            ModelSource::Downloaded(model_id) => {
                let cache = ModelCache::new()?;
                let dir = cache.model_path(model_id);
                if !dir.exists() {
                    return Err(ObjcutError::model(format!(
                        "Model '{model_id}' is not cached. Fetch it first (objcut fetch-model) \
                         or pass a local model directory."
                    )));
                }
                dir
            },
            ModelSource::Path(dir) => dir.clone(),
        };

        let manager = Self { model_dir };
        manager.validate()?;
        Ok(manager)
    }

    /// Check that the directory holds the expected ONNX pair
    ///
    /// # Errors
    /// [`ObjcutError::Model`] naming the missing file.
    pub fn validate(&self) -> Result<()> {
        for file in [ENCODER_FILE, DECODER_FILE] {
            let path = self.model_dir.join(file);
            if !path.exists() {
                return Err(ObjcutError::model(format!(
                    "Model directory '{}' is missing '{file}'",
                    self.model_dir.display()
                )));
            }
        }
        Ok(())
    }

    /// The resolved model directory
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Path to the image encoder
    #[must_use]
    pub fn encoder_path(&self) -> PathBuf {
        self.model_dir.join(ENCODER_FILE)
    }

    /// Path to the prompt decoder
    #[must_use]
    pub fn decoder_path(&self) -> PathBuf {
        self.model_dir.join(DECODER_FILE)
    }
}
