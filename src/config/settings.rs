//! Configuration settings for vidfetch.

use crate::media::{FormatSpec, MediaMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub download: DownloadSettings,
    pub batch: BatchSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root for scoped temporary directories. Empty means the system temp dir.
    pub temp_dir: String,
    /// Log level used when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: String::new(),
            log_level: "warn".to_string(),
        }
    }
}

/// Download and placement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Destination directory for finished files.
    pub output_dir: String,
    /// Ordered format preference chain for video downloads.
    pub formats: Vec<String>,
    /// Ordered format preference chain for audio extraction.
    pub audio_formats: Vec<String>,
    /// Codec yt-dlp extracts audio to.
    pub audio_codec: String,
    /// Audio quality passed to yt-dlp.
    pub audio_quality: String,
    /// Maximum length of the title part of a filename.
    pub max_title_length: usize,
    /// Local sample used when every format fails.
    pub fallback_asset: String,
    /// URL used when `download` is called without one.
    pub sample_url: String,
    /// yt-dlp executable name or path.
    pub ytdlp_path: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: "~/Downloads/vidfetch".to_string(),
            formats: vec![
                "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/\
                 bestvideo[height<=480]+bestaudio/best[ext=mp4]/best"
                    .to_string(),
                "bestvideo[height<=480]+bestaudio/best".to_string(),
                "best".to_string(),
            ],
            audio_formats: vec!["bestaudio/best".to_string()],
            audio_codec: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            max_title_length: crate::download::DEFAULT_MAX_LENGTH,
            fallback_asset: "media/sample.mp4".to_string(),
            sample_url: "https://www.youtube.com/watch?v=p-d5S9JHYQQ".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// File holding one URL per line.
    pub urls_file: String,
    /// Maximum number of requests in flight.
    pub concurrency: usize,
    /// Process only the first N URLs.
    pub limit: Option<usize>,
    /// Skip URLs whose predicted file already exists.
    pub skip_existing: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            urls_file: "urls.txt".to_string(),
            concurrency: 2,
            limit: None,
            skip_existing: true,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidfetch")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded destination directory.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.download.output_dir)
    }

    /// Get the root for scoped temporary directories.
    pub fn temp_dir(&self) -> PathBuf {
        if self.general.temp_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            Self::expand_path(&self.general.temp_dir)
        }
    }

    /// Get the expanded fallback asset path.
    pub fn fallback_asset(&self) -> PathBuf {
        Self::expand_path(&self.download.fallback_asset)
    }

    /// Get the expanded URL list path.
    pub fn urls_file(&self) -> PathBuf {
        Self::expand_path(&self.batch.urls_file)
    }

    /// Format preference chain for the given mode.
    pub fn format_chain(&self, mode: MediaMode) -> Vec<FormatSpec> {
        let raw = match mode {
            MediaMode::Video => &self.download.formats,
            MediaMode::Audio => &self.download.audio_formats,
        };
        raw.iter().map(FormatSpec::new).collect()
    }
}
