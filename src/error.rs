//! Error types for vidfetch.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One failed format attempt, kept for diagnostics when the whole chain is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// The format spec that was tried.
    pub format: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.format, self.reason)
    }
}

/// Library-level error type for vidfetch operations.
#[derive(Error, Debug)]
pub enum VidfetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Requested format is not available: {0}")]
    FormatUnavailable(String),

    #[error("Network or remote error: {0}")]
    NetworkFailure(String),

    #[error("Download failed for {url} after {} attempt(s): {last}", .attempts.len())]
    DownloadFailure {
        url: String,
        attempts: Vec<AttemptFailure>,
        last: String,
    },

    #[error("Fallback asset not available: {}", .0.display())]
    FallbackUnavailable(PathBuf),

    #[error("Failed to place file in {}: {source}", .dir.display())]
    PersistenceFailure {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VidfetchError {
    /// Short name of the pipeline stage the error belongs to, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            VidfetchError::FormatUnavailable(_)
            | VidfetchError::NetworkFailure(_)
            | VidfetchError::DownloadFailure { .. }
            | VidfetchError::ToolNotFound(_)
            | VidfetchError::ToolFailed(_) => "download",
            VidfetchError::FallbackUnavailable(_) => "fallback",
            VidfetchError::PersistenceFailure { .. } => "placement",
            VidfetchError::Config(_) | VidfetchError::TomlParse(_) => "configuration",
            VidfetchError::InvalidInput(_) => "input",
            VidfetchError::Io(_) | VidfetchError::Json(_) => "io",
        }
    }
}

/// Result type alias for vidfetch operations.
pub type Result<T> = std::result::Result<T, VidfetchError>;
