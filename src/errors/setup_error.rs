use thiserror::Error;

use super::{ConfigError, IterationError};

/// Result type for run setup
pub type SetupResult<T> = Result<T, SetupError>;

/// Failures before the first scenario starts; any of these halts the run
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sitemap crawl or another setup request failed
    #[error("setup failed: {0}")]
    Setup(#[from] IterationError),
}
