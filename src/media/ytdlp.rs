//! yt-dlp backend.
//!
//! Runs the `yt-dlp` executable once per attempt and turns its exit status
//! and stderr into an [`AttemptOutcome`].

use super::{
    AttemptOutcome, FetchedMedia, FormatSpec, MediaBackend, MediaMetadata, MediaMode,
    DEFAULT_EXTENSION, OUTPUT_STEM,
};
use crate::config::Settings;
use crate::error::{Result, VidfetchError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Printed by yt-dlp once the final file is in place.
const AFTER_MOVE_TEMPLATE: &str = "after_move:%(.{id,title,ext,filepath})j";

/// yt-dlp's wording when a format selector matches nothing.
const FORMAT_UNAVAILABLE_MARKER: &str = "requested format is not available";

/// Media backend driving the yt-dlp command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    binary: String,
    audio_codec: String,
    audio_quality: String,
}

impl YtDlpBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            audio_codec: "mp3".to_string(),
            audio_quality: "192K".to_string(),
        }
    }

    /// Create a backend from the download settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            binary: settings.download.ytdlp_path.clone(),
            audio_codec: settings.download.audio_codec.clone(),
            audio_quality: settings.download.audio_quality.clone(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-playlist")
            .arg("--no-warnings")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> VidfetchError {
        if e.kind() == std::io::ErrorKind::NotFound {
            VidfetchError::ToolNotFound(self.binary.clone())
        } else {
            VidfetchError::ToolFailed(format!("{} execution failed: {e}", self.binary))
        }
    }
}

impl Default for YtDlpBackend {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<MediaMetadata> {
        let output = self
            .base_command()
            .arg("--dump-json")
            .arg("--skip-download")
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = last_json_line(&stdout)
            .ok_or_else(|| VidfetchError::ToolFailed("yt-dlp printed no metadata".into()))?;
        let json: serde_json::Value = serde_json::from_str(line)?;

        Ok(MediaMetadata::from_json(&json))
    }

    #[instrument(skip(self, dir), fields(format = %format))]
    async fn fetch(
        &self,
        url: &str,
        format: &FormatSpec,
        mode: MediaMode,
        dir: &Path,
    ) -> AttemptOutcome {
        let template = dir.join(format!("{OUTPUT_STEM}.%(ext)s"));

        let mut cmd = self.base_command();
        cmd.arg("--format")
            .arg(format.as_str())
            .arg("--output")
            .arg(&template)
            .arg("--no-progress")
            .arg("--print")
            .arg(AFTER_MOVE_TEMPLATE);

        if mode == MediaMode::Audio {
            cmd.arg("--extract-audio")
                .arg("--audio-format")
                .arg(&self.audio_codec)
                .arg("--audio-quality")
                .arg(&self.audio_quality);
        }

        let output = match cmd.arg(url).output().await {
            Ok(o) => o,
            Err(e) => return AttemptOutcome::Fatal(self.spawn_error(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return AttemptOutcome::Recoverable(classify_failure(&stderr, output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match locate_output(&stdout, dir) {
            Ok(fetched) => {
                debug!("yt-dlp produced {:?}", fetched.path);
                AttemptOutcome::Success(fetched)
            }
            Err(e) => AttemptOutcome::Recoverable(e),
        }
    }
}

/// Map yt-dlp's stderr to a recoverable error kind.
fn classify_failure(stderr: &str, code: Option<i32>) -> VidfetchError {
    let summary = error_summary(stderr).unwrap_or_else(|| match code {
        Some(c) => format!("yt-dlp exited with status {c}"),
        None => "yt-dlp was terminated by a signal".to_string(),
    });

    if stderr.to_lowercase().contains(FORMAT_UNAVAILABLE_MARKER) {
        VidfetchError::FormatUnavailable(summary)
    } else {
        VidfetchError::NetworkFailure(summary)
    }
}

/// The most relevant line of yt-dlp's stderr: the last `ERROR:` line, else the last line.
fn error_summary(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
}

fn last_json_line(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| l.starts_with('{'))
}

/// Work out which file an attempt produced and what the source said about it.
fn locate_output(stdout: &str, dir: &Path) -> Result<FetchedMedia> {
    let json = last_json_line(stdout)
        .and_then(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .unwrap_or_default();

    let mut metadata = MediaMetadata::from_json(&json);

    let reported = json["filepath"]
        .as_str()
        .map(PathBuf::from)
        .filter(|p| p.is_file());

    let path = match reported {
        Some(p) => p,
        None => find_media_file(dir)?,
    };

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        metadata.extension = ext.to_string();
    } else if metadata.extension.is_empty() {
        metadata.extension = DEFAULT_EXTENSION.to_string();
    }

    Ok(FetchedMedia { path, metadata })
}

/// Locates the downloaded file by its stem, ignoring yt-dlp leftovers.
fn find_media_file(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| VidfetchError::ToolFailed(format!("Cannot read download directory: {e}")))?;

    let prefix = format!("{OUTPUT_STEM}.");
    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl")
        })
        .collect();

    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| VidfetchError::ToolFailed("Downloaded file not found after yt-dlp exited".into()))
}
