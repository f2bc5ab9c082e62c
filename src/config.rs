//! Configuration types for the cutout pipeline

use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = crate::error::ObjcutError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(crate::error::ObjcutError::invalid_config(format!(
                "Unknown execution provider '{other}'. Valid providers: auto, cpu, cuda, coreml"
            ))),
        }
    }
}

/// Configuration for segmentation-and-cutout runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutConfig {
    /// Model specification (cached id or local directory)
    pub model_spec: ModelSpec,

    /// Execution provider for the inference backend
    pub execution_provider: ExecutionProvider,

    /// Directory the derived outputs are written to
    pub output_dir: PathBuf,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            execution_provider: ExecutionProvider::default(),
            output_dir: PathBuf::from("."),
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
        }
    }
}

impl CutoutConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> CutoutConfigBuilder {
        CutoutConfigBuilder::default()
    }
}

/// Builder for [`CutoutConfig`]
#[derive(Debug, Default)]
pub struct CutoutConfigBuilder {
    config: CutoutConfig,
}

impl CutoutConfigBuilder {
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CutoutConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_provider_round_trip() {
        for provider in [
            ExecutionProvider::Auto,
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda,
            ExecutionProvider::CoreMl,
        ] {
            let parsed: ExecutionProvider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let config = CutoutConfig::builder().build();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.intra_threads, 0);
        assert!(!config.debug);
    }

    #[test]
    fn test_builder_chaining() {
        let config = CutoutConfig::builder()
            .execution_provider(ExecutionProvider::Cpu)
            .output_dir("/tmp/out")
            .intra_threads(4)
            .debug(true)
            .build();
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.intra_threads, 4);
        assert!(config.debug);
    }
}
