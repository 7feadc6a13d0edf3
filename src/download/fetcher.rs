//! Format-fallback downloader.
//!
//! Tries each format spec of a preference chain in order until one produces a
//! file. All attempts share one scoped temporary directory, which is removed
//! on every exit path unless a successful result takes ownership of it.

use super::progress::{emit, ProgressEvent, ProgressSender};
use super::DownloadResult;
use crate::error::{AttemptFailure, Result, VidfetchError};
use crate::media::{AttemptOutcome, FormatSpec, MediaBackend, MediaMode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Prefix of the scoped directories created under the temp root.
const TEMP_PREFIX: &str = "vidfetch-";

/// Downloads a URL with a degrading list of format specs.
pub struct FormatFallbackDownloader {
    backend: Arc<dyn MediaBackend>,
    temp_root: PathBuf,
    progress: Option<ProgressSender>,
}

impl FormatFallbackDownloader {
    pub fn new(backend: Arc<dyn MediaBackend>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            temp_root: temp_root.into(),
            progress: None,
        }
    }

    /// Report attempts on the given channel.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Download `url`, trying `formats` strictly in order.
    ///
    /// The first success wins and later specs are never tried. A fatal outcome
    /// stops the chain early. When nothing succeeds the error carries every
    /// attempt and the last failure.
    #[instrument(skip(self, formats), fields(url = %url, backend = self.backend.name()))]
    pub async fn download(
        &self,
        url: &str,
        formats: &[FormatSpec],
        mode: MediaMode,
    ) -> Result<DownloadResult> {
        if formats.is_empty() {
            return Err(VidfetchError::DownloadFailure {
                url: url.to_string(),
                attempts: Vec::new(),
                last: "no format preferences configured".to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.temp_root).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.temp_root)?;

        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for format in formats {
            info!("Trying format '{}'", format);
            emit(
                self.progress.as_ref(),
                ProgressEvent::TryingFormat {
                    url: url.to_string(),
                    format: format.to_string(),
                },
            );

            let outcome = self.backend.fetch(url, format, mode, temp_dir.path()).await;
            let (err, fatal) = match outcome {
                AttemptOutcome::Success(fetched) => {
                    info!("Format '{}' succeeded: {:?}", format, fetched.path);
                    let file_name = fetched
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    emit(
                        self.progress.as_ref(),
                        ProgressEvent::Downloaded {
                            url: url.to_string(),
                            file_name,
                        },
                    );
                    return Ok(DownloadResult::downloaded(
                        fetched.path,
                        fetched.metadata,
                        format.clone(),
                        temp_dir,
                    ));
                }
                AttemptOutcome::Recoverable(err) => (err, false),
                AttemptOutcome::Fatal(err) => (err, true),
            };

            info!("Format '{}' failed: {}", format, err);
            emit(
                self.progress.as_ref(),
                ProgressEvent::FormatFailed {
                    url: url.to_string(),
                    format: format.to_string(),
                    reason: err.to_string(),
                },
            );
            attempts.push(AttemptFailure {
                format: format.to_string(),
                reason: err.to_string(),
            });

            if fatal {
                info!("Giving up on remaining formats for {}", url);
                break;
            }
        }

        let path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            warn!("Failed to remove temporary directory {:?}: {}", path, e);
        }

        let last = attempts
            .last()
            .map(|a| a.reason.clone())
            .unwrap_or_default();

        Err(VidfetchError::DownloadFailure {
            url: url.to_string(),
            attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::ScriptedBackend;

    fn specs(list: &[&str]) -> Vec<FormatSpec> {
        list.iter().map(|s| FormatSpec::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .unavailable("fmt_A")
                .fail("fmt_B", "HTTP 503")
                .succeed("fmt_C", Some("My Clip"), Some("xyz"), "mp4")
                .succeed("fmt_D", Some("Other"), None, "webm"),
        );
        let downloader = FormatFallbackDownloader::new(backend.clone(), root.path());

        let result = downloader
            .download("U", &specs(&["fmt_A", "fmt_B", "fmt_C", "fmt_D"]), MediaMode::Video)
            .await
            .unwrap();

        assert_eq!(backend.attempts(), vec!["fmt_A", "fmt_B", "fmt_C"]);
        assert_eq!(
            result.origin(),
            &crate::download::Origin::Downloaded { format: FormatSpec::new("fmt_C") }
        );
        assert_eq!(result.metadata().title.as_deref(), Some("My Clip"));
        assert!(result.path().is_file());

        // The result owns the directory until cleanup.
        let temp = result.temp_dir().unwrap().to_path_buf();
        assert!(temp.is_dir());
        result.cleanup();
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_all_failures_report_last_and_remove_temp_dir() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .unavailable("fmt_A")
                .fail("fmt_B", "connection reset"),
        );
        let downloader = FormatFallbackDownloader::new(backend.clone(), root.path());

        let err = downloader
            .download("U", &specs(&["fmt_A", "fmt_B"]), MediaMode::Video)
            .await
            .unwrap_err();

        match err {
            VidfetchError::DownloadFailure { url, attempts, last } => {
                assert_eq!(url, "U");
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].format, "fmt_A");
                assert!(attempts[0].reason.contains("not available"));
                assert!(last.contains("connection reset"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let dirs = backend.dirs();
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], dirs[1], "attempts share one scoped directory");
        assert!(!dirs[0].exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fatal_outcome_stops_chain() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .fatal("fmt_A", "yt-dlp")
                .succeed("fmt_B", Some("never"), None, "mp4"),
        );
        let downloader = FormatFallbackDownloader::new(backend.clone(), root.path());

        let err = downloader
            .download("U", &specs(&["fmt_A", "fmt_B"]), MediaMode::Video)
            .await
            .unwrap_err();

        assert!(matches!(err, VidfetchError::DownloadFailure { ref attempts, .. } if attempts.len() == 1));
        assert_eq!(backend.attempts(), vec!["fmt_A"]);
        assert!(!backend.dirs()[0].exists());
    }

    #[tokio::test]
    async fn test_empty_chain_fails_without_attempts() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let downloader = FormatFallbackDownloader::new(backend.clone(), root.path());

        let err = downloader.download("U", &[], MediaMode::Video).await.unwrap_err();
        assert!(matches!(err, VidfetchError::DownloadFailure { ref attempts, .. } if attempts.is_empty()));
        assert!(backend.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .unavailable("fmt_A")
                .succeed("fmt_B", Some("My Clip"), Some("xyz"), "mp4"),
        );
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let downloader = FormatFallbackDownloader::new(backend, root.path()).with_progress(tx);

        let result = downloader
            .download("U", &specs(&["fmt_A", "fmt_B"]), MediaMode::Video)
            .await
            .unwrap();
        result.cleanup();
        drop(downloader);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(match event {
                ProgressEvent::TryingFormat { format, .. } => format!("try {format}"),
                ProgressEvent::FormatFailed { format, .. } => format!("fail {format}"),
                ProgressEvent::Downloaded { file_name, .. } => format!("done {file_name}"),
                other => panic!("unexpected: {other:?}"),
            });
        }
        assert_eq!(
            kinds,
            vec!["try fmt_A", "fail fmt_A", "try fmt_B", "done video.mp4"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_download_removes_temp_dir() {
        use crate::media::{FetchedMedia, MediaMetadata};
        use async_trait::async_trait;
        use std::path::Path;
        use std::sync::Mutex;

        /// Records its directory, then never finishes.
        struct Hanging(Mutex<Option<PathBuf>>);

        #[async_trait]
        impl MediaBackend for Hanging {
            fn name(&self) -> &str {
                "hanging"
            }

            async fn probe(&self, _url: &str) -> Result<MediaMetadata> {
                Ok(MediaMetadata::default())
            }

            async fn fetch(
                &self,
                _url: &str,
                _format: &FormatSpec,
                _mode: MediaMode,
                dir: &Path,
            ) -> AttemptOutcome {
                *self.0.lock().unwrap() = Some(dir.to_path_buf());
                std::future::pending::<()>().await;
                AttemptOutcome::Success(FetchedMedia {
                    path: dir.join("never"),
                    metadata: MediaMetadata::default(),
                })
            }
        }

        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(Hanging(Mutex::new(None)));
        let downloader = FormatFallbackDownloader::new(backend.clone(), root.path());
        let formats = specs(&["best"]);

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            downloader.download("U", &formats, MediaMode::Video),
        )
        .await;
        assert!(timed_out.is_err());

        let dir = backend.0.lock().unwrap().clone().unwrap();
        assert!(!dir.exists());
    }
}
