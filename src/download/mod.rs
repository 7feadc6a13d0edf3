//! Download, fallback and placement of remote media.
//!
//! A request flows through [`FormatFallbackDownloader`], which owns a scoped
//! temporary directory, and ends in [`Placer`], which copies the file to its
//! destination and releases that directory.

mod fetcher;
mod placement;
mod progress;
mod sanitize;

pub use fetcher::FormatFallbackDownloader;
pub use placement::{PersistedArtifact, Placer, STAGING_SUFFIX};
pub use progress::{ProgressEvent, ProgressSender};
pub(crate) use progress::emit;
pub use sanitize::{sanitize, sanitize_bounded, sanitize_default, DEFAULT_MAX_LENGTH, MAX_NAME_BYTES, PLACEHOLDER};

use crate::media::{FormatSpec, MediaMetadata, MediaMode};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// One download request. Immutable once built.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    source_url: String,
    format_preferences: Vec<FormatSpec>,
    destination_dir: PathBuf,
    mode: MediaMode,
}

impl DownloadRequest {
    pub fn new(
        source_url: impl Into<String>,
        format_preferences: Vec<FormatSpec>,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            format_preferences,
            destination_dir: destination_dir.into(),
            mode: MediaMode::Video,
        }
    }

    pub fn with_mode(mut self, mode: MediaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn format_preferences(&self) -> &[FormatSpec] {
        &self.format_preferences
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn mode(&self) -> MediaMode {
        self.mode
    }
}

/// Where a [`DownloadResult`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Fetched from the remote source with this format spec.
    Downloaded { format: FormatSpec },
    /// Substituted from the bundled sample.
    Fallback,
}

/// An acquired file waiting to be placed.
///
/// Downloaded results own the scoped temporary directory holding the file;
/// dropping or cleaning up the result removes it.
#[derive(Debug)]
pub struct DownloadResult {
    path: PathBuf,
    metadata: MediaMetadata,
    origin: Origin,
    temp_dir: Option<TempDir>,
}

impl DownloadResult {
    pub(crate) fn downloaded(
        path: PathBuf,
        metadata: MediaMetadata,
        format: FormatSpec,
        temp_dir: TempDir,
    ) -> Self {
        Self {
            path,
            metadata,
            origin: Origin::Downloaded { format },
            temp_dir: Some(temp_dir),
        }
    }

    pub(crate) fn fallback(path: PathBuf, metadata: MediaMetadata) -> Self {
        Self {
            path,
            metadata,
            origin: Origin::Fallback,
            temp_dir: None,
        }
    }

    /// Path of the acquired file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// True when the bundled sample stands in for the requested media.
    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::Fallback
    }

    /// The scoped directory owning the file, if any.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|d| d.path())
    }

    /// Remove the owning temporary directory. Fallback results own nothing.
    pub fn cleanup(self) {
        if let Some(dir) = self.temp_dir {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed temporary directory {:?}", path),
                Err(e) => warn!("Failed to remove temporary directory {:?}: {}", path, e),
            }
        }
    }
}
