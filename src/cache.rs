//! Model cache management for downloaded checkpoints
//!
//! Cached models live in an XDG-compliant directory, one subdirectory per
//! model id. A model id is derived from its repository URL
//! (`owner/repo` becomes `owner--repo`).

use crate::error::{ObjcutError, Result};
use crate::models::{DECODER_FILE, ENCODER_FILE};
use std::fs;
use std::path::{Path, PathBuf};

/// Default segmentation model repository
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/facebook/sam-vit-huge";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from URL)
    pub model_id: String,
    /// Path to the cached model directory
    pub path: PathBuf,
    /// Whether the image encoder is present
    pub has_encoder: bool,
    /// Whether the prompt decoder is present
    pub has_decoder: bool,
    /// Estimated size of the model directory in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Uses the XDG cache location (`~/.cache/objcut/models` on Linux/macOS,
    /// `%LOCALAPPDATA%/objcut/models` on Windows), overridable through the
    /// `OBJCUT_CACHE_DIR` environment variable.
    ///
    /// # Errors
    /// - Failed to determine the cache directory
    /// - Failed to create the cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::resolve_cache_dir()?;

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                ObjcutError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    fn resolve_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var("OBJCUT_CACHE_DIR") {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                ObjcutError::invalid_config(
                    "Failed to determine cache directory. Set OBJCUT_CACHE_DIR.",
                )
            })?
            .join("objcut")
            .join("models"))
    }

    /// Generate a model id from a repository URL
    ///
    /// `https://huggingface.co/facebook/sam-vit-huge` becomes
    /// `facebook--sam-vit-huge`; non-HuggingFace URLs hash to a stable
    /// `url-<digest>` id.
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        let prefix = "https://huggingface.co/";
        if let Some(repo_path) = url.strip_prefix(prefix) {
            repo_path.replace('/', "--")
        } else {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(url.as_bytes());
            let digest = format!("url-{:x}", hasher.finalize());
            digest.get(..16).unwrap_or(&digest).to_string()
        }
    }

    /// The default model id
    #[must_use]
    pub fn default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    /// Path to a model directory inside the cache (may not exist)
    #[must_use]
    pub fn model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    /// Whether a model is cached with both ONNX files present
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        Self::validate_model_directory(&self.model_path(model_id))
    }

    /// The cache directory in use
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Scan the cache and describe every model directory found
    ///
    /// # Errors
    /// - Failed to read the cache directory or its entries
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            ObjcutError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                ObjcutError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;
            let path = entry.path();
            if path.is_dir() {
                if let Some(info) = Self::describe_model_directory(&path) {
                    models.push(info);
                }
            }
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove one cached model
    ///
    /// # Errors
    /// - Model not cached
    /// - Failed to remove the directory
    pub fn clear_model(&self, model_id: &str) -> Result<()> {
        let path = self.model_path(model_id);
        if !path.exists() {
            return Err(ObjcutError::invalid_config(format!(
                "Model '{model_id}' is not cached"
            )));
        }
        fs::remove_dir_all(&path)
            .map_err(|e| ObjcutError::file_io_error("remove cached model", &path, &e))?;
        log::info!("Removed cached model {model_id}");
        Ok(())
    }

    /// Remove every cached model, returning the removed ids
    ///
    /// # Errors
    /// - Failed to scan or remove cache entries
    pub fn clear_all(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for info in self.scan_cached_models()? {
            fs::remove_dir_all(&info.path)
                .map_err(|e| ObjcutError::file_io_error("remove cached model", &info.path, &e))?;
            removed.push(info.model_id);
        }
        Ok(removed)
    }

    fn validate_model_directory(model_path: &Path) -> bool {
        model_path.join(ENCODER_FILE).exists() && model_path.join(DECODER_FILE).exists()
    }

    fn describe_model_directory(model_path: &Path) -> Option<CachedModelInfo> {
        let model_id = model_path.file_name()?.to_str()?.to_string();

        Some(CachedModelInfo {
            model_id,
            path: model_path.to_path_buf(),
            has_encoder: model_path.join(ENCODER_FILE).exists(),
            has_decoder: model_path.join(DECODER_FILE).exists(),
            size_bytes: directory_size(model_path).unwrap_or(0),
        })
    }
}

fn directory_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            total += directory_size(&path)?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Human-readable byte size for cache listings
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
