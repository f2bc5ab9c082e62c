//! Checkpoint downloading from `HuggingFace` repositories
//!
//! Downloads every file of a model repository into the local cache with
//! progress reporting, size-based skip of already-present files, atomic
//! directory placement, and SHA-256 integrity verification.

use crate::cache::ModelCache;
use crate::error::{ObjcutError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Default checkpoint repository for the fill model driving object removal
pub const DEFAULT_CHECKPOINT_URL: &str = "https://huggingface.co/yikaiwang/ASUKA-FLUX.1-Fill";

/// Checkpoint file the fill model cannot run without
pub const REQUIRED_CHECKPOINT: &str = "asuka_decoder.ckpt";

/// Kind of `HuggingFace` repository, selecting the API namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    /// Model repository (`/api/models/...`)
    Model,
    /// Dataset repository (`/api/datasets/...`)
    Dataset,
}

impl RepoKind {
    fn api_segment(self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Dataset => "datasets",
        }
    }
}

/// One entry of a repository file listing
#[derive(Debug, Clone, Deserialize)]
pub struct RepoFile {
    /// Path of the file inside the repository
    pub path: String,
    /// File size in bytes when the API reports it
    pub size: Option<u64>,
    #[serde(rename = "type")]
    entry_type: String,
}

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ObjcutError::network_error("Failed to create HTTP client", e))?;

        let cache = ModelCache::new()?;

        Ok(Self { client, cache })
    }

    /// Download every file of a model repository into the cache
    ///
    /// Files already present in the cache with their expected byte size are
    /// not downloaded again. The repository lands atomically: files are
    /// staged in a temp directory and moved into place only on success.
    /// Returns the model id the repository is cached under.
    ///
    /// # Errors
    /// - Invalid or unsupported URL format
    /// - Network errors during listing or download
    /// - File system errors during caching
    pub async fn download_repository(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_repo_url(url)?;
        let model_id = ModelCache::url_to_model_id(url);
        log::info!("Downloading checkpoints from {url}");
        log::info!("Model id: {model_id}");

        let files = self.list_repo_files(url, RepoKind::Model).await?;
        if files.is_empty() {
            return Err(ObjcutError::network_error(
                "Repository listing",
                format!("no downloadable files in {url}"),
            ));
        }

        let final_dir = self.cache.model_path(&model_id);
        let temp_dir = Self::create_temp_download_dir(&model_id)?;

        let progress = show_progress.then(Self::create_progress_indicator);

        let result = self
            .download_repo_files(url, &files, &final_dir, &temp_dir, progress.as_ref())
            .await;

        match result {
            Ok(downloaded) => {
                Self::merge_into(&temp_dir, &final_dir)?;
                if let Some(pb) = progress {
                    pb.finish_with_message(format!("Downloaded {model_id}"));
                }
                log::info!(
                    "Fetched {downloaded} file(s), {} already present",
                    files.len() - downloaded
                );
                Ok(model_id)
            },
            Err(e) => {
                if temp_dir.exists() {
                    if let Err(cleanup_err) = fs::remove_dir_all(&temp_dir) {
                        log::warn!("Failed to clean up temp directory: {cleanup_err}");
                    }
                }
                if let Some(pb) = progress {
                    pb.finish_with_message("Download failed".to_string());
                }
                Err(e)
            },
        }
    }

    /// List a repository's files through the `HuggingFace` tree API
    ///
    /// Directories and hidden files (`.gitattributes` and friends) are
    /// filtered out, matching what a checkpoint consumer needs.
    ///
    /// # Errors
    /// - Network or HTTP errors
    /// - Unexpected listing payload
    pub async fn list_repo_files(&self, url: &str, kind: RepoKind) -> Result<Vec<RepoFile>> {
        let (owner, repo) = parse_repo_url(url)?;
        let api_url = format!(
            "https://huggingface.co/api/{}/{owner}/{repo}/tree/main?recursive=true",
            kind.api_segment()
        );
        log::debug!("Listing repository files via {api_url}");

        let response = self
            .client
            .get(&api_url)
            .send()
            .await
            .map_err(|e| ObjcutError::network_error(format!("Failed to list {url}"), e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ObjcutError::Network(format!(
                "HTTP {status} for {url}. The repository may be gated: log in and accept \
                 its terms on the HuggingFace page first."
            )));
        }
        if !status.is_success() {
            return Err(ObjcutError::Network(format!("HTTP {status} for {api_url}")));
        }

        let entries: Vec<RepoFile> = response
            .json()
            .await
            .map_err(|e| ObjcutError::network_error("Failed to parse repository listing", e))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.entry_type == "file")
            .filter(|entry| !file_name_of(&entry.path).starts_with('.'))
            .collect())
    }

    async fn download_repo_files(
        &self,
        base_url: &str,
        files: &[RepoFile],
        final_dir: &Path,
        temp_dir: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<usize> {
        let raw_base = format!("{base_url}/resolve/main/");
        let mut downloaded = 0;

        for file in files {
            // Skip files the cache already holds at the expected size
            if let Some(expected) = file.size {
                let existing = final_dir.join(&file.path);
                if file_matches_size(&existing, expected) {
                    log::debug!("Skipping {} (already present, {expected} bytes)", file.path);
                    continue;
                }
            }

            let file_url = format!("{raw_base}{}", file.path);
            let local_path = temp_dir.join(&file.path);

            if let Some(pb) = progress {
                pb.set_message(format!("Downloading {}", file.path));
            }

            self.download_file(&file_url, &local_path, progress).await?;
            downloaded += 1;
        }

        Ok(downloaded)
    }

    /// Download a single file with streaming and progress reporting
    pub async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<()> {
        log::debug!("Downloading: {url} -> {}", local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ObjcutError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ObjcutError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(ObjcutError::Network(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        let total_size = response.content_length();

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| ObjcutError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| ObjcutError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| ObjcutError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if let Some(total) = total_size {
                    pb.set_length(total);
                    pb.set_position(downloaded);
                } else {
                    pb.set_message(format!(
                        "Downloaded {:.1} MB",
                        downloaded as f64 / 1_048_576.0
                    ));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| ObjcutError::file_io_error("flush file", local_path, &e))?;

        log::debug!("Downloaded {downloaded} bytes to {}", local_path.display());
        Ok(())
    }

    /// Verify a downloaded file against an expected SHA-256 digest
    ///
    /// Returns `Ok(true)` when no digest is provided.
    ///
    /// # Errors
    /// - Failed to read the file
    pub fn verify_file_integrity(
        &self,
        file_path: &Path,
        expected_hash: Option<&str>,
    ) -> Result<bool> {
        let Some(expected) = expected_hash else {
            return Ok(true);
        };

        let contents = fs::read(file_path)
            .map_err(|e| ObjcutError::file_io_error("read file for verification", file_path, &e))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let actual = format!("{:x}", hasher.finalize());

        if actual == expected {
            Ok(true)
        } else {
            log::warn!(
                "Integrity check failed for {}: expected {expected}, got {actual}",
                file_path.display()
            );
            Ok(false)
        }
    }

    /// Get the model cache for other operations
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    fn create_temp_download_dir(model_id: &str) -> Result<PathBuf> {
        let temp_dir = std::env::temp_dir().join(format!("objcut-{model_id}"));

        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).map_err(|e| {
                ObjcutError::file_io_error("remove existing temp directory", &temp_dir, &e)
            })?;
        }

        fs::create_dir_all(&temp_dir)
            .map_err(|e| ObjcutError::file_io_error("create temp directory", &temp_dir, &e))?;

        Ok(temp_dir)
    }

    /// Move staged files into the cache directory, keeping skipped files
    fn merge_into(temp_dir: &Path, final_dir: &Path) -> Result<()> {
        fs::create_dir_all(final_dir)
            .map_err(|e| ObjcutError::file_io_error("create model directory", final_dir, &e))?;

        for entry in walk_files(temp_dir)? {
            let relative = entry
                .strip_prefix(temp_dir)
                .map_err(|e| ObjcutError::processing(format!("Bad staged path: {e}")))?;
            let target = final_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ObjcutError::file_io_error("create directory", parent, &e))?;
            }
            if target.exists() {
                fs::remove_file(&target)
                    .map_err(|e| ObjcutError::file_io_error("replace cached file", &target, &e))?;
            }
            fs::rename(&entry, &target)
                .map_err(|e| ObjcutError::file_io_error("move downloaded file", &target, &e))?;
        }

        fs::remove_dir_all(temp_dir)
            .map_err(|e| ObjcutError::file_io_error("remove temp directory", temp_dir, &e))?;
        Ok(())
    }

    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }
}

fn file_matches_size(path: &Path, expected: u64) -> bool {
    expected > 0
        && path
            .metadata()
            .map(|meta| meta.len() == expected)
            .unwrap_or(false)
}

fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| ObjcutError::file_io_error("read directory", dir, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ObjcutError::file_io_error("read directory entry", dir, &e))?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(walk_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// Validate that a URL is a supported `HuggingFace` repository
///
/// # Errors
/// - Empty URL, wrong host, or missing `owner/repo` path
pub fn validate_repo_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ObjcutError::invalid_config("Repository URL cannot be empty"));
    }

    if !url.starts_with("https://huggingface.co/") {
        return Err(ObjcutError::invalid_config(format!(
            "Unsupported URL format: {url}. Only HuggingFace repositories are supported \
             (https://huggingface.co/...)"
        )));
    }

    let repo_path = url.strip_prefix("https://huggingface.co/").unwrap_or("");
    if repo_path.is_empty() || !repo_path.contains('/') {
        return Err(ObjcutError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {url}. Expected format: \
             https://huggingface.co/owner/repo-name"
        )));
    }

    Ok(())
}

/// Parse a `HuggingFace` URL into `(owner, repository)`
///
/// Dataset URLs may carry a `datasets/` prefix, which is stripped.
///
/// # Errors
/// - URL fails [`validate_repo_url`]
pub fn parse_repo_url(url: &str) -> Result<(String, String)> {
    validate_repo_url(url)?;

    let repo_path = url
        .strip_prefix("https://huggingface.co/")
        .unwrap_or("")
        .trim_start_matches("datasets/");
    let mut parts = repo_path.split('/');

    let owner = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ObjcutError::invalid_config(format!("Missing owner in URL: {url}")))?;
    let repo = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ObjcutError::invalid_config(format!("Missing repository in URL: {url}")))?;

    Ok((owner.to_string(), repo.to_string()))
}
