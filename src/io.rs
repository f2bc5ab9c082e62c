//! Image acquisition and decoding
//!
//! The loader accepts a local path or an HTTP(S) URL and always hands the
//! pipeline an 8-bit RGB buffer; color-mode conversion happens here, not in
//! the core.

use crate::error::{ObjcutError, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a source image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local filesystem path
    Path(PathBuf),
    /// Remote HTTP(S) URL
    Url(String),
}

impl ImageSource {
    /// Interpret a CLI-style string: URLs by scheme, everything else as a path
    #[must_use]
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Loader for source images from disk or network
pub struct ImageLoader {
    client: reqwest::Client,
}

impl ImageLoader {
    /// Create a loader with its own HTTP client
    ///
    /// # Errors
    /// Failed to construct the HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ObjcutError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client })
    }

    /// Load a source image and convert it to 8-bit RGB
    ///
    /// # Errors
    /// - [`ObjcutError::SourceUnavailable`] when the file is missing or the
    ///   HTTP fetch fails
    /// - [`ObjcutError::Decode`] when the bytes are not a valid raster
    pub async fn load(&self, source: &ImageSource) -> Result<RgbImage> {
        match source {
            ImageSource::Path(path) => Self::load_from_path(path),
            ImageSource::Url(url) => {
                let bytes = self.fetch(url).await?;
                Self::load_from_bytes(&bytes)
            },
        }
    }

    /// Load and decode a local image file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ObjcutError::source_unavailable(format!(
                "image file '{}' does not exist",
                path.display()
            )));
        }

        // Extension-based decode first, then content-based detection; some
        // sources hand out mislabeled files.
        match image::open(path) {
            Ok(img) => Ok(img.to_rgb8()),
            Err(e) => {
                log::debug!(
                    "Extension-based decode failed for {}: {}. Retrying with content detection.",
                    path.display(),
                    e
                );
                let data = std::fs::read(path)
                    .map_err(|io_err| ObjcutError::file_io_error("read image file", path, &io_err))?;
                Self::load_from_bytes(&data)
            },
        }
    }

    /// Decode raw image bytes to 8-bit RGB
    pub fn load_from_bytes(bytes: &[u8]) -> Result<RgbImage> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(decoded.to_rgb8())
    }

    /// Fetch a remote resource into memory
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("Fetching source image from {url}");

        let response = self.client.get(url).send().await.map_err(|e| {
            ObjcutError::source_unavailable(format!("failed to fetch '{url}': {e}"))
        })?;

        if !response.status().is_success() {
            return Err(ObjcutError::source_unavailable(format!(
                "HTTP {} for '{url}'",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ObjcutError::source_unavailable(format!("failed to read body of '{url}': {e}"))
        })?;

        log::debug!("Fetched {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}
