//! Tracing configuration for the CLI
//!
//! The library only emits events (through `log` and `tracing`); subscriber
//! setup belongs to the application. The CLI maps its `-v` flags onto an
//! `EnvFilter`, with `RUST_LOG` taking precedence when set.

use tracing_subscriber::EnvFilter;

/// Tracing configuration for CLI runs
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v` flags
    pub verbosity: u8,
    /// Explicit filter string, overriding verbosity when set
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set a custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Convert verbosity level to a tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A subscriber was already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = if let Some(env_filter) = &self.env_filter {
            EnvFilter::try_new(env_filter)?
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::try_from_default_env()?
        } else {
            EnvFilter::try_new(self.verbosity_to_filter())?
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.verbosity >= 2)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

        Ok(())
    }
}

/// Initialize tracing for a CLI run from the `-v` count
///
/// # Errors
/// - Subscriber initialization failures
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new().with_verbosity(verbosity).init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().verbosity_to_filter(), "warn");
        assert_eq!(
            TracingConfig::new().with_verbosity(1).verbosity_to_filter(),
            "info"
        );
        assert_eq!(
            TracingConfig::new().with_verbosity(2).verbosity_to_filter(),
            "debug"
        );
        assert_eq!(
            TracingConfig::new().with_verbosity(9).verbosity_to_filter(),
            "trace"
        );
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig::new()
            .with_verbosity(0)
            .with_env_filter("objcut=debug");
        assert_eq!(config.env_filter.as_deref(), Some("objcut=debug"));
    }
}
