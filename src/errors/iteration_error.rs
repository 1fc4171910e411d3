use thiserror::Error;

/// Result type for a single VU action or iteration
pub type IterationResult<T> = Result<T, IterationError>;

/// Fatal iteration errors
///
/// Any of these terminates the current VU iteration only. They never cross VU
/// boundaries and are never retried within the iteration.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("status code was *not* {expected} (got {actual}) for {url}")]
    UnexpectedStatus {
        url: String,
        expected: u16,
        actual: u16,
    },

    #[error("check '{check}' failed for {url}")]
    CheckFailed { check: &'static str, url: String },

    #[error("login failed for {username}: {reason}")]
    LoginFailed { username: String, reason: String },

    #[error("failed to add to cart: {0}")]
    CartFailed(String),

    #[error("sitemap error: {0}")]
    Sitemap(String),

    #[error("no candidates to sample for {0}")]
    EmptyCandidates(&'static str),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IterationError {
    /// Short tag used in iteration logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnexpectedStatus { .. } => "status",
            Self::CheckFailed { .. } => "check",
            Self::LoginFailed { .. } => "login",
            Self::CartFailed(_) => "cart",
            Self::Sitemap(_) => "sitemap",
            Self::EmptyCandidates(_) => "sample",
            Self::Transport(_) => "transport",
        }
    }
}
