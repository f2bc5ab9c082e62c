//! Command-line interface for segmentation cutouts and fetch utilities

use crate::{
    cache::{format_size, ModelCache},
    config::{CutoutConfig, ExecutionProvider},
    dataset::{DatasetFetcher, DEFAULT_DATASET_URL, EXPECTED_LAYOUT},
    download::{ModelDownloader, DEFAULT_CHECKPOINT_URL, REQUIRED_CHECKPOINT},
    io::ImageSource,
    models::{ModelSource, ModelSpec},
    processor::CutoutProcessor,
    tracing_config::init_cli_tracing,
    types::PointPrompt,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

/// Object segmentation and cutout tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "objcut")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Segment one object by point prompt and write the derived images
    Cutout(CutoutArgs),
    /// Download model checkpoints from a HuggingFace repository
    FetchModel(FetchModelArgs),
    /// Download and extract a dataset from HuggingFace
    FetchDataset(FetchDatasetArgs),
    /// List cached models
    ListModels,
    /// Remove cached models (all, or one with --model)
    ClearCache {
        /// Model id to remove instead of clearing everything
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the model cache directory
    ShowCacheDir,
}

#[derive(Args)]
struct CutoutArgs {
    /// Input image: local path or HTTP(S) URL
    #[arg(value_name = "INPUT")]
    input: String,

    /// Point prompt inside the object, as X,Y pixel coordinates
    #[arg(short, long, value_name = "X,Y")]
    point: PointPrompt,

    /// Directory the three output images are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output file stem [default: input file name]
    #[arg(long)]
    stem: Option<String>,

    /// Model id, repository URL, or local model directory
    #[arg(short, long)]
    model: Option<String>,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value = "auto")]
    execution_provider: ExecutionProvider,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
}

#[derive(Args)]
struct FetchModelArgs {
    /// Repository URL to download
    #[arg(long, default_value = DEFAULT_CHECKPOINT_URL)]
    url: String,

    /// Files that must exist after the download
    #[arg(long, value_name = "FILE")]
    require: Vec<String>,

    /// Hide the download progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args)]
struct FetchDatasetArgs {
    /// Dataset repository URL to download
    #[arg(long, default_value = DEFAULT_DATASET_URL)]
    repo: String,

    /// Directory to extract the dataset into
    #[arg(long, default_value = "./data")]
    output_dir: PathBuf,
}

/// CLI entry point
///
/// # Errors
/// Any pipeline, download, or cache failure; the binary maps these to a
/// non-zero exit code.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose)?;

    match cli.command {
        Command::Cutout(args) => run_cutout(args).await,
        Command::FetchModel(args) => run_fetch_model(args).await,
        Command::FetchDataset(args) => run_fetch_dataset(args).await,
        Command::ListModels => run_list_models(),
        Command::ClearCache { model } => run_clear_cache(model),
        Command::ShowCacheDir => run_show_cache_dir(),
    }
}

async fn run_cutout(args: CutoutArgs) -> Result<()> {
    let source = ImageSource::parse(&args.input);
    let stem = args.stem.unwrap_or_else(|| derive_stem(&args.input));

    let mut config = CutoutConfig::builder()
        .execution_provider(args.execution_provider)
        .output_dir(&args.output_dir)
        .intra_threads(args.threads)
        .build();
    if let Some(model) = &args.model {
        config.model_spec = ModelSpec {
            source: ModelSource::parse(model),
        };
    }

    let mut processor = CutoutProcessor::new(config);
    let mut result = processor
        .process_source(&source, args.point)
        .await
        .with_context(|| format!("Failed to process {source}"))?;

    let paths = result
        .save_all(&args.output_dir, &stem)
        .with_context(|| format!("Failed to write outputs to {}", args.output_dir.display()))?;

    info!("{}", result.timings.summary());
    println!("Selected mask score: {:.4}", result.score);
    for path in &paths {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

async fn run_fetch_model(args: FetchModelArgs) -> Result<()> {
    let downloader = ModelDownloader::new()?;
    let model_id = downloader
        .download_repository(&args.url, !args.no_progress)
        .await
        .with_context(|| format!("Failed to download {}", args.url))?;

    let model_dir = downloader.cache().model_path(&model_id);
    println!("Downloaded {model_id} to {}", model_dir.display());

    // The default checkpoint repository is unusable without its decoder
    let required = if args.require.is_empty() && args.url == DEFAULT_CHECKPOINT_URL {
        vec![REQUIRED_CHECKPOINT.to_string()]
    } else {
        args.require
    };

    for file in &required {
        let path = model_dir.join(file);
        if path.exists() {
            println!("Verified {file}");
        } else {
            warn!("Required file '{file}' was not found in the repository");
            println!("Warning: required file '{file}' is missing from {model_id}");
        }
    }
    Ok(())
}

async fn run_fetch_dataset(args: FetchDatasetArgs) -> Result<()> {
    let fetcher = DatasetFetcher::new()?;
    let report = fetcher
        .fetch_dataset(&args.repo, &args.output_dir, EXPECTED_LAYOUT)
        .await
        .with_context(|| format!("Failed to download {}", args.repo))?;

    println!(
        "Dataset extracted to {} ({} archive(s))",
        report.output_dir.display(),
        report.archives_extracted
    );
    for status in &report.directories {
        match status.file_count {
            Some(count) => println!("  {}: {count} files", status.path),
            None => println!("  {}: MISSING", status.path),
        }
    }
    if !report.is_complete() {
        warn!(
            "Dataset layout incomplete, missing: {}",
            report.missing().join(", ")
        );
    }
    Ok(())
}

fn run_list_models() -> Result<()> {
    let cache = ModelCache::new()?;
    let models = cache.scan_cached_models()?;

    if models.is_empty() {
        println!("No cached models. Use 'objcut fetch-model' to download one.");
        return Ok(());
    }

    println!("Cached models in {}:", cache.cache_dir().display());
    for model in models {
        let completeness = if model.has_encoder && model.has_decoder {
            "complete"
        } else {
            "incomplete"
        };
        println!(
            "  {} ({}, {completeness})",
            model.model_id,
            format_size(model.size_bytes)
        );
    }
    Ok(())
}

fn run_clear_cache(model: Option<String>) -> Result<()> {
    let cache = ModelCache::new()?;
    match model {
        Some(model_id) => {
            cache.clear_model(&model_id)?;
            println!("Removed {model_id}");
        },
        None => {
            let removed = cache.clear_all()?;
            if removed.is_empty() {
                println!("Cache is already empty");
            } else {
                for model_id in removed {
                    println!("Removed {model_id}");
                }
            }
        },
    }
    Ok(())
}

fn run_show_cache_dir() -> Result<()> {
    let cache = ModelCache::new()?;
    println!("{}", cache.cache_dir().display());
    Ok(())
}

/// Output stem from the input's file name, for both paths and URLs
fn derive_stem(input: &str) -> String {
    let last_segment = input
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);
    let stem = last_segment
        .rsplit_once('.')
        .map_or(last_segment, |(stem, _ext)| stem);
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_derive_stem() {
        assert_eq!(derive_stem("input/car.png"), "car");
        assert_eq!(derive_stem("car.jpeg"), "car");
        assert_eq!(derive_stem("https://example.com/assets/car.png"), "car");
        assert_eq!(derive_stem("noext"), "noext");
        assert_eq!(derive_stem(""), "image");
    }

    #[test]
    fn test_parse_cutout_command() {
        let cli = Cli::parse_from([
            "objcut", "cutout", "car.png", "--point", "450,600", "--output-dir", "out",
        ]);
        match cli.command {
            Command::Cutout(args) => {
                assert_eq!(args.input, "car.png");
                assert_eq!(args.point, PointPrompt::new(450, 600));
                assert_eq!(args.output_dir, PathBuf::from("out"));
                assert_eq!(args.execution_provider, ExecutionProvider::Auto);
            },
            _ => panic!("expected cutout subcommand"),
        }
    }

    #[test]
    fn test_parse_fetch_dataset_defaults() {
        let cli = Cli::parse_from(["objcut", "fetch-dataset"]);
        match cli.command {
            Command::FetchDataset(args) => {
                assert_eq!(args.repo, DEFAULT_DATASET_URL);
                assert_eq!(args.output_dir, PathBuf::from("./data"));
            },
            _ => panic!("expected fetch-dataset subcommand"),
        }
    }
}
