//! Remote media source abstraction for vidfetch.
//!
//! Provides a trait-based interface over the tool that actually talks to the
//! remote video host, so the download loop never depends on one tool's
//! error reporting.

mod local;
mod ytdlp;

pub use local::{fallback_result, is_media_file};
pub use ytdlp::YtDlpBackend;

use crate::error::{Result, VidfetchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File stem every backend writes into its scoped directory.
pub const OUTPUT_STEM: &str = "video";

/// Extension assumed when neither the file nor the source reports one.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// An opaque format-selection query, passed to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatSpec(String);

impl FormatSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormatSpec {
    fn from(spec: &str) -> Self {
        Self::new(spec)
    }
}

/// What kind of file a request should end up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    /// Keep the container the source produces.
    #[default]
    Video,
    /// Extract the audio track to a fixed codec.
    Audio,
}

impl std::fmt::Display for MediaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaMode::Video => write!(f, "video"),
            MediaMode::Audio => write!(f, "audio"),
        }
    }
}

/// Metadata the remote source reports about a media item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Title, if the source reports one.
    pub title: Option<String>,
    /// Source-specific identifier, if any.
    pub id: Option<String>,
    /// File extension without the leading dot.
    pub extension: String,
}

impl MediaMetadata {
    /// Build metadata from a yt-dlp style JSON object.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let non_empty = |key: &str| {
            json[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            title: non_empty("title"),
            id: non_empty("id"),
            extension: non_empty("ext").unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        }
    }
}

/// A file one attempt produced inside the scoped directory.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub path: PathBuf,
    pub metadata: MediaMetadata,
}

/// Result of a single download attempt with a single format spec.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The file was produced.
    Success(FetchedMedia),
    /// This spec failed; the next one may still work.
    Recoverable(VidfetchError),
    /// Nothing will work for this request.
    Fatal(VidfetchError),
}

/// Trait for remote media backends.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Fetch metadata without downloading the payload.
    async fn probe(&self, url: &str) -> Result<MediaMetadata>;

    /// Download `url` once with `format` into `dir`.
    async fn fetch(&self, url: &str, format: &FormatSpec, mode: MediaMode, dir: &Path)
        -> AttemptOutcome;
}
