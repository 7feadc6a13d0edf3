//! Pipeline orchestrator for vidfetch.
//!
//! Coordinates one request from the existence pre-check through download,
//! fallback and placement.

use crate::config::Settings;
use crate::download::{
    emit, DownloadRequest, DownloadResult, FormatFallbackDownloader, PersistedArtifact, Placer,
    ProgressEvent, ProgressSender,
};
use crate::error::Result;
use crate::media::{fallback_result, is_media_file, MediaBackend, MediaMode, YtDlpBackend, OUTPUT_STEM};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Probe metadata first and skip when the predicted file already exists.
    pub skip_existing: bool,
    /// Local sample to degrade to when every format fails.
    pub fallback_asset: Option<PathBuf>,
}

/// Terminal state of a request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was placed; `degraded` when it is the fallback sample.
    Placed {
        artifact: PersistedArtifact,
        degraded: bool,
    },
    /// A file with the predicted name already existed.
    Skipped { existing: PathBuf },
}

impl Outcome {
    /// Path of the file the caller ends up with.
    pub fn path(&self) -> &Path {
        match self {
            Outcome::Placed { artifact, .. } => &artifact.final_path,
            Outcome::Skipped { existing } => existing,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Placed { degraded: false, .. } => "placed",
            Outcome::Placed { degraded: true, .. } => "degraded",
            Outcome::Skipped { .. } => "skipped",
        }
    }
}

/// The main orchestrator for the vidfetch pipeline.
pub struct Orchestrator {
    backend: Arc<dyn MediaBackend>,
    downloader: FormatFallbackDownloader,
    placer: Placer,
    audio_codec: String,
    progress: Option<ProgressSender>,
}

impl Orchestrator {
    /// Create an orchestrator backed by yt-dlp.
    pub fn new(settings: &Settings) -> Self {
        let backend: Arc<dyn MediaBackend> = Arc::new(YtDlpBackend::from_settings(settings));
        Self::with_components(
            backend,
            settings.temp_dir(),
            Placer::new(settings.download.max_title_length),
        )
        .with_audio_codec(&settings.download.audio_codec)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        backend: Arc<dyn MediaBackend>,
        temp_root: impl Into<PathBuf>,
        placer: Placer,
    ) -> Self {
        Self {
            downloader: FormatFallbackDownloader::new(backend.clone(), temp_root),
            backend,
            placer,
            audio_codec: "mp3".to_string(),
            progress: None,
        }
    }

    pub fn with_audio_codec(mut self, codec: &str) -> Self {
        self.audio_codec = codec.to_string();
        self
    }

    /// Report progress on the given channel.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.downloader = self.downloader.with_progress(progress.clone());
        self.progress = Some(progress);
        self
    }

    pub fn placer(&self) -> &Placer {
        &self.placer
    }

    /// Acquire the requested media, degrading to `fallback_asset` when every format fails.
    ///
    /// Fails only when the asset itself is missing.
    pub async fn acquire(&self, request: &DownloadRequest, fallback_asset: &Path) -> Result<DownloadResult> {
        self.obtain(request, Some(fallback_asset)).await
    }

    async fn obtain(&self, request: &DownloadRequest, fallback_asset: Option<&Path>) -> Result<DownloadResult> {
        let url = request.source_url();
        let download = self
            .downloader
            .download(url, request.format_preferences(), request.mode())
            .await;

        let err = match download {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let Some(asset) = fallback_asset else {
            return Err(err);
        };

        info!("Unable to fetch {}: {}. Falling back to {:?}", url, err, asset);
        emit(
            self.progress.as_ref(),
            ProgressEvent::FallingBack {
                url: url.to_string(),
                asset: asset.to_path_buf(),
                reason: err.to_string(),
            },
        );

        fallback_result(asset)
    }

    /// Predict the final name from a metadata probe and return it if it already exists.
    ///
    /// Anything that prevents the check counts as "not present".
    pub async fn probe_existing(&self, request: &DownloadRequest) -> Option<PathBuf> {
        let metadata = match self.backend.probe(request.source_url()).await {
            Ok(m) => m,
            Err(e) => {
                debug!(
                    "Existence pre-check failed for {}: {}; continuing with download",
                    request.source_url(),
                    e
                );
                return None;
            }
        };

        let dir = request.destination_dir();
        match request.mode() {
            MediaMode::Audio => {
                let name = self.placer.predicted_name(&metadata, OUTPUT_STEM, &self.audio_codec);
                let candidate = dir.join(name);
                candidate.is_file().then_some(candidate)
            }
            // The container depends on which format won, so any media extension counts.
            MediaMode::Video => find_media_with_stem(dir, &self.placer.base_name(&metadata, OUTPUT_STEM)),
        }
    }

    /// Run one request to a terminal state.
    #[instrument(skip(self, request, options), fields(url = %request.source_url()))]
    pub async fn process(&self, request: &DownloadRequest, options: &ProcessOptions) -> Result<Outcome> {
        let outcome = self.run(request, options).await;
        if let Err(e) = &outcome {
            emit(
                self.progress.as_ref(),
                ProgressEvent::Failed {
                    url: request.source_url().to_string(),
                    stage: e.stage(),
                    reason: e.to_string(),
                },
            );
        }
        outcome
    }

    async fn run(&self, request: &DownloadRequest, options: &ProcessOptions) -> Result<Outcome> {
        if options.skip_existing {
            if let Some(existing) = self.probe_existing(request).await {
                info!("Skipping {}: {:?} already exists", request.source_url(), existing);
                emit(
                    self.progress.as_ref(),
                    ProgressEvent::Skipped {
                        url: request.source_url().to_string(),
                        existing: existing.clone(),
                    },
                );
                return Ok(Outcome::Skipped { existing });
            }
        }

        let result = self.obtain(request, options.fallback_asset.as_deref()).await?;
        let degraded = result.is_degraded();

        let artifact = self.placer.place(result, request.destination_dir()).await?;
        emit(
            self.progress.as_ref(),
            ProgressEvent::Placed {
                url: request.source_url().to_string(),
                path: artifact.final_path.clone(),
            },
        );

        Ok(Outcome::Placed { artifact, degraded })
    }
}

/// A media file in `dir` named `<stem>.<ext>`.
fn find_media_with_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.file_stem().and_then(|s| s.to_str()) == Some(stem))
        .find(|path| path.is_file() && is_media_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VidfetchError;
    use crate::media::testing::ScriptedBackend;
    use crate::media::{FormatSpec, MediaMode};

    struct Fixture {
        temp_root: tempfile::TempDir,
        dest: tempfile::TempDir,
        assets: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                temp_root: tempfile::tempdir().unwrap(),
                dest: tempfile::tempdir().unwrap(),
                assets: tempfile::tempdir().unwrap(),
            }
        }

        fn orchestrator(&self, backend: Arc<ScriptedBackend>) -> Orchestrator {
            Orchestrator::with_components(backend, self.temp_root.path(), Placer::default())
        }

        fn request(&self, formats: &[&str]) -> DownloadRequest {
            DownloadRequest::new(
                "U",
                formats.iter().map(|f| FormatSpec::new(*f)).collect(),
                self.dest.path(),
            )
        }

        fn asset(&self) -> PathBuf {
            let path = self.assets.path().join("hyena.mp4");
            std::fs::write(&path, b"bundled sample").unwrap();
            path
        }

        fn temp_root_is_empty(&self) -> bool {
            std::fs::read_dir(self.temp_root.path()).unwrap().count() == 0
        }

        fn dest_entries(&self) -> usize {
            std::fs::read_dir(self.dest.path()).unwrap().count()
        }
    }

    #[tokio::test]
    async fn test_second_format_succeeds_end_to_end() {
        let fx = Fixture::new();
        let backend = Arc::new(
            ScriptedBackend::new()
                .unavailable("fmt_A")
                .succeed("fmt_B", Some("My Clip"), Some("xyz"), "mp4"),
        );
        let orchestrator = fx.orchestrator(backend.clone());

        let outcome = orchestrator
            .process(&fx.request(&["fmt_A", "fmt_B"]), &ProcessOptions::default())
            .await
            .unwrap();

        let expected = fx.dest.path().join("My_Clip-xyz.mp4");
        assert_eq!(outcome.path(), expected.as_path());
        assert_eq!(outcome.label(), "placed");
        assert!(expected.is_file());
        assert_eq!(backend.attempts(), vec!["fmt_A", "fmt_B"]);
        assert!(fx.temp_root_is_empty());
    }

    #[tokio::test]
    async fn test_all_formats_fail_degrades_to_sample() {
        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new().fail("fmt_A", "HTTP 500").fail("fmt_B", "HTTP 500"));
        let orchestrator = fx.orchestrator(backend.clone());
        let asset = fx.asset();

        let result = orchestrator
            .acquire(&fx.request(&["fmt_A", "fmt_B"]), &asset)
            .await
            .unwrap();

        assert!(result.is_degraded());
        assert_eq!(result.path(), asset.as_path());
        assert!(!backend.dirs()[0].exists());
        assert!(fx.temp_root_is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retries_and_fallback_log_below_warn() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new().unavailable("fmt_A").fatal("fmt_B", "yt-dlp"));
        let options = ProcessOptions {
            skip_existing: false,
            fallback_asset: Some(fx.asset()),
        };

        let outcome = fx
            .orchestrator(backend)
            .process(&fx.request(&["fmt_A", "fmt_B"]), &options)
            .await
            .unwrap();

        assert_eq!(outcome.label(), "degraded");
        let written = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(written.is_empty(), "unexpected warnings: {written}");
    }

    #[tokio::test]
    async fn test_degraded_outcome_is_placed() {
        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = fx.orchestrator(backend);
        let options = ProcessOptions {
            skip_existing: false,
            fallback_asset: Some(fx.asset()),
        };

        let outcome = orchestrator.process(&fx.request(&["fmt_A"]), &options).await.unwrap();

        assert_eq!(outcome.label(), "degraded");
        assert_eq!(outcome.path(), fx.dest.path().join("hyena.mp4").as_path());
        assert_eq!(std::fs::read(outcome.path()).unwrap(), b"bundled sample");
    }

    #[tokio::test]
    async fn test_missing_fallback_asset_fails_without_writing() {
        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = fx.orchestrator(backend);
        let missing = fx.assets.path().join("absent.mp4");
        let options = ProcessOptions {
            skip_existing: false,
            fallback_asset: Some(missing.clone()),
        };

        let err = orchestrator
            .process(&fx.request(&["fmt_A", "fmt_B"]), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, VidfetchError::FallbackUnavailable(ref p) if *p == missing));
        assert_eq!(fx.dest_entries(), 0);
        assert!(fx.temp_root_is_empty());
    }

    #[tokio::test]
    async fn test_without_fallback_download_failure_propagates() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(Arc::new(ScriptedBackend::new()));

        let err = orchestrator
            .process(&fx.request(&["fmt_A"]), &ProcessOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, VidfetchError::DownloadFailure { .. }));
        assert_eq!(fx.dest_entries(), 0);
    }

    #[tokio::test]
    async fn test_failure_emits_terminal_event() {
        let fx = Fixture::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = fx.orchestrator(Arc::new(ScriptedBackend::new())).with_progress(tx);

        let result = orchestrator
            .process(&fx.request(&["fmt_A"]), &ProcessOptions::default())
            .await;
        assert!(result.is_err());
        drop(orchestrator);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        match last {
            Some(ProgressEvent::Failed { url, stage, .. }) => {
                assert_eq!(url, "U");
                assert_eq!(stage, "download");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_skip_existing_short_circuits() {
        let fx = Fixture::new();
        std::fs::write(fx.dest.path().join("My_Clip-xyz.mp4"), b"old").unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_probe("My Clip", "xyz")
                .succeed("best", Some("My Clip"), Some("xyz"), "mp4"),
        );
        let orchestrator = fx.orchestrator(backend.clone());
        let options = ProcessOptions {
            skip_existing: true,
            fallback_asset: None,
        };

        let outcome = orchestrator.process(&fx.request(&["best"]), &options).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Skipped {
                existing: fx.dest.path().join("My_Clip-xyz.mp4")
            }
        );
        assert!(backend.attempts().is_empty());
        assert_eq!(fx.dest_entries(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_continues_with_download() {
        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new().succeed("best", Some("My Clip"), Some("xyz"), "mp4"));
        let orchestrator = fx.orchestrator(backend.clone());
        let options = ProcessOptions {
            skip_existing: true,
            fallback_asset: None,
        };

        let outcome = orchestrator.process(&fx.request(&["best"]), &options).await.unwrap();

        assert_eq!(backend.probe_count(), 1);
        assert_eq!(outcome.label(), "placed");
    }

    #[tokio::test]
    async fn test_audio_mode_predicts_codec_extension() {
        let fx = Fixture::new();
        std::fs::write(fx.dest.path().join("Song-abc.opus"), b"old").unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_probe("Song", "abc"));
        let orchestrator = fx.orchestrator(backend).with_audio_codec("opus");
        let request = fx.request(&["bestaudio/best"]).with_mode(MediaMode::Audio);

        let existing = orchestrator.probe_existing(&request).await;
        assert_eq!(existing, Some(fx.dest.path().join("Song-abc.opus")));
    }

    #[tokio::test]
    async fn test_skip_existing_matches_other_containers() {
        let fx = Fixture::new();
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_probe("Clip", "c1")
                .succeed("best", Some("Clip"), Some("c1"), "webm"),
        );
        let orchestrator = fx.orchestrator(backend.clone());
        let options = ProcessOptions {
            skip_existing: true,
            fallback_asset: None,
        };
        let request = fx.request(&["best"]);

        let first = orchestrator.process(&request, &options).await.unwrap();
        assert_eq!(first.path(), fx.dest.path().join("Clip-c1.webm").as_path());

        let second = orchestrator.process(&request, &options).await.unwrap();
        assert_eq!(
            second,
            Outcome::Skipped {
                existing: fx.dest.path().join("Clip-c1.webm")
            }
        );
        assert_eq!(backend.attempts(), vec!["best"]);
        assert_eq!(fx.dest_entries(), 1);
    }

    #[tokio::test]
    async fn test_skip_existing_ignores_suffixed_and_non_media() {
        let fx = Fixture::new();
        std::fs::write(fx.dest.path().join("Clip-c1-1.webm"), b"other").unwrap();
        std::fs::write(fx.dest.path().join("Clip-c1.txt"), b"notes").unwrap();
        let backend = Arc::new(ScriptedBackend::new().with_probe("Clip", "c1"));
        let orchestrator = fx.orchestrator(backend);

        assert_eq!(orchestrator.probe_existing(&fx.request(&["best"])).await, None);
    }

    #[tokio::test]
    async fn test_same_name_twice_gets_suffix() {
        let fx = Fixture::new();
        let backend = Arc::new(ScriptedBackend::new().succeed("best", Some("Title"), Some("abc123"), "mp4"));
        let orchestrator = fx.orchestrator(backend);
        let request = fx.request(&["best"]);

        let first = orchestrator.process(&request, &ProcessOptions::default()).await.unwrap();
        let second = orchestrator.process(&request, &ProcessOptions::default()).await.unwrap();

        assert_eq!(first.path(), fx.dest.path().join("Title-abc123.mp4").as_path());
        assert_eq!(second.path(), fx.dest.path().join("Title-abc123-1.mp4").as_path());
    }
}
