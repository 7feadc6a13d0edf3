//! Bundled local sample used when remote acquisition fails.

use super::{MediaMetadata, DEFAULT_EXTENSION};
use crate::download::DownloadResult;
use crate::error::{Result, VidfetchError};
use std::path::Path;
use tracing::warn;

/// Supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "opus", "m4a", "wma", "aiff", "alac",
];

/// Supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpeg", "mpg", "3gp",
];

/// Check if path looks like an audio or video file.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Build a degraded result that points at the bundled sample.
///
/// The asset is treated as already acquired: no network access, and the file
/// is never removed by placement cleanup.
pub fn fallback_result(asset: &Path) -> Result<DownloadResult> {
    if !asset.is_file() {
        return Err(VidfetchError::FallbackUnavailable(asset.to_path_buf()));
    }

    if !is_media_file(asset) {
        warn!("Fallback asset {:?} does not look like a media file", asset);
    }

    let extension = asset
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(DEFAULT_EXTENSION)
        .to_string();

    let metadata = MediaMetadata {
        title: None,
        id: None,
        extension,
    };

    Ok(DownloadResult::fallback(asset.to_path_buf(), metadata))
}
