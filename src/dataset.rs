//! Dataset downloading and extraction
//!
//! Fetches an inpainting dataset repository from `HuggingFace`, extracts any
//! zip archives it ships, places loose payload files, and verifies the
//! resulting directory layout against the expected structure.

use crate::download::{parse_repo_url, walk_files, ModelDownloader, RepoKind};
use crate::error::{ObjcutError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default dataset repository (image/mask pairs at 512 and 1024 resolution)
pub const DEFAULT_DATASET_URL: &str = "https://huggingface.co/datasets/yikaiwang/MISATO";

/// Directory layout the default dataset is expected to extract to
pub const EXPECTED_LAYOUT: &[&str] = &["512/image", "512/mask", "1024/image", "1024/mask"];

/// Verification status of one expected dataset directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryStatus {
    /// Expected directory, relative to the dataset root
    pub path: String,
    /// Number of PNG files found; `None` when the directory is missing
    pub file_count: Option<usize>,
}

impl DirectoryStatus {
    /// Whether the directory exists
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.file_count.is_some()
    }
}

/// Result of a dataset fetch: where it landed and what was verified
#[derive(Debug, Clone)]
pub struct DatasetReport {
    /// Dataset root directory
    pub output_dir: PathBuf,
    /// Number of archive files extracted
    pub archives_extracted: usize,
    /// Per-directory verification results
    pub directories: Vec<DirectoryStatus>,
}

impl DatasetReport {
    /// Whether every expected directory is present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.directories.iter().all(DirectoryStatus::is_present)
    }

    /// Expected directories that were not found
    #[must_use]
    pub fn missing(&self) -> Vec<&str> {
        self.directories
            .iter()
            .filter(|status| !status.is_present())
            .map(|status| status.path.as_str())
            .collect()
    }
}

/// Dataset fetcher built on the checkpoint download plumbing
pub struct DatasetFetcher {
    downloader: ModelDownloader,
}

impl DatasetFetcher {
    /// Create a new dataset fetcher
    ///
    /// # Errors
    /// - Failed to create the underlying HTTP client
    pub fn new() -> Result<Self> {
        Ok(Self {
            downloader: ModelDownloader::new()?,
        })
    }

    /// Download a dataset repository and extract it into `output_dir`
    ///
    /// Zip archives are expanded in place; other payload files keep their
    /// repository-relative paths. Afterward the layout is verified against
    /// `expected_dirs` and the per-directory PNG counts are reported.
    /// An incomplete layout is reported, not an error.
    ///
    /// # Errors
    /// - Invalid repository URL
    /// - Network errors during listing or download (gated repositories
    ///   surface an accept-the-terms hint)
    /// - Archive extraction or filesystem errors
    pub async fn fetch_dataset<P: AsRef<Path>>(
        &self,
        url: &str,
        output_dir: P,
        expected_dirs: &[&str],
    ) -> Result<DatasetReport> {
        let output_dir = output_dir.as_ref();
        let (owner, repo) = parse_repo_url(url)?;
        log::info!("Downloading dataset {owner}/{repo} into {}", output_dir.display());

        fs::create_dir_all(output_dir)
            .map_err(|e| ObjcutError::file_io_error("create output directory", output_dir, &e))?;

        let files = self.downloader.list_repo_files(url, RepoKind::Dataset).await?;
        if files.is_empty() {
            return Err(ObjcutError::Network(format!(
                "Repository listing: no downloadable files in {url}"
            )));
        }

        let staging = output_dir.join(".objcut-staging");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| {
                ObjcutError::file_io_error("remove stale staging directory", &staging, &e)
            })?;
        }

        let raw_base = format!("{url}/resolve/main/");
        for file in &files {
            let local_path = staging.join(&file.path);
            let file_url = format!("{raw_base}{}", file.path);
            log::info!("Downloading {}", file.path);
            self.downloader
                .download_file(&file_url, &local_path, None)
                .await?;
        }

        let archives_extracted = Self::place_payload(&staging, output_dir)?;

        fs::remove_dir_all(&staging)
            .map_err(|e| ObjcutError::file_io_error("remove staging directory", &staging, &e))?;

        let report = Self::verify_layout(output_dir, expected_dirs, archives_extracted);
        for status in &report.directories {
            match status.file_count {
                Some(count) => log::info!("{}: {count} files", status.path),
                None => log::warn!("{}: not found", status.path),
            }
        }

        Ok(report)
    }

    /// Extract archives and move loose files from staging into the output dir
    fn place_payload(staging: &Path, output_dir: &Path) -> Result<usize> {
        let mut archives_extracted = 0;

        for file in walk_files(staging)? {
            let is_zip = file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

            if is_zip {
                log::info!("Extracting {}", file.display());
                extract_zip(&file, output_dir)?;
                archives_extracted += 1;
            } else {
                let relative = file
                    .strip_prefix(staging)
                    .map_err(|e| ObjcutError::processing(format!("Bad staged path: {e}")))?;
                let target = output_dir.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| ObjcutError::file_io_error("create directory", parent, &e))?;
                }
                fs::rename(&file, &target)
                    .map_err(|e| ObjcutError::file_io_error("place dataset file", &target, &e))?;
            }
        }

        Ok(archives_extracted)
    }

    /// Verify the extracted tree against the expected directory layout
    #[must_use]
    pub fn verify_layout(
        output_dir: &Path,
        expected_dirs: &[&str],
        archives_extracted: usize,
    ) -> DatasetReport {
        let directories = expected_dirs
            .iter()
            .map(|dir| {
                let full = output_dir.join(dir);
                let file_count = full.is_dir().then(|| count_png_files(&full));
                DirectoryStatus {
                    path: (*dir).to_string(),
                    file_count,
                }
            })
            .collect();

        DatasetReport {
            output_dir: output_dir.to_path_buf(),
            archives_extracted,
            directories,
        }
    }
}

/// Extract a zip archive, refusing entries that escape the target directory
fn extract_zip(archive_path: &Path, output_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .map_err(|e| ObjcutError::file_io_error("open archive", archive_path, &e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ObjcutError::processing(format!("Invalid zip archive: {e}")))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ObjcutError::processing(format!("Failed to read archive entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry: {}", entry.name());
            continue;
        };
        let target = output_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ObjcutError::file_io_error("create directory", &target, &e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ObjcutError::file_io_error("create directory", parent, &e))?;
            }
            let mut out = fs::File::create(&target)
                .map_err(|e| ObjcutError::file_io_error("create extracted file", &target, &e))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| ObjcutError::file_io_error("extract archive entry", &target, &e))?;
        }
    }

    log::debug!(
        "Extracted {} entries from {}",
        archive.len(),
        archive_path.display()
    );
    Ok(())
}

fn count_png_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|entry| {
                    entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
                })
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("data.zip");
        write_zip(
            &archive,
            &[
                ("512/image/0000.png", b"png-bytes" as &[u8]),
                ("512/mask/0000.png", b"png-bytes"),
            ],
        );

        let out = tmp.path().join("data");
        fs::create_dir_all(&out).unwrap();
        extract_zip(&archive, &out).unwrap();

        assert!(out.join("512/image/0000.png").exists());
        assert!(out.join("512/mask/0000.png").exists());
    }

    #[test]
    fn test_verify_layout_complete() {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["512/image", "512/mask"] {
            let full = tmp.path().join(dir);
            fs::create_dir_all(&full).unwrap();
            fs::write(full.join("0000.png"), b"png").unwrap();
            fs::write(full.join("0001.png"), b"png").unwrap();
            fs::write(full.join("notes.txt"), b"txt").unwrap();
        }

        let report =
            DatasetFetcher::verify_layout(tmp.path(), &["512/image", "512/mask"], 1);
        assert!(report.is_complete());
        assert_eq!(report.archives_extracted, 1);
        for status in &report.directories {
            assert_eq!(status.file_count, Some(2));
        }
    }

    #[test]
    fn test_verify_layout_reports_missing() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("512/image")).unwrap();

        let report = DatasetFetcher::verify_layout(tmp.path(), EXPECTED_LAYOUT, 0);
        assert!(!report.is_complete());
        assert_eq!(
            report.missing(),
            vec!["512/mask", "1024/image", "1024/mask"]
        );
    }

    #[test]
    fn test_place_payload_extracts_and_moves() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("staging");
        let out = tmp.path().join("out");
        fs::create_dir_all(staging.join("docs")).unwrap();
        fs::create_dir_all(&out).unwrap();

        write_zip(
            &staging.join("part1.zip"),
            &[("1024/image/0000.png", b"png" as &[u8])],
        );
        fs::write(staging.join("docs/README.md"), b"readme").unwrap();

        let extracted = DatasetFetcher::place_payload(&staging, &out).unwrap();
        assert_eq!(extracted, 1);
        assert!(out.join("1024/image/0000.png").exists());
        assert!(out.join("docs/README.md").exists());
        // Archives themselves are not copied into the output tree
        assert!(!out.join("part1.zip").exists());
    }
}
