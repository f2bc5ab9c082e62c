//! Object cutout CLI tool
//!
//! Command-line interface for the objcut library: point-prompted
//! segmentation cutouts plus checkpoint and dataset fetching.

use objcut::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
