//! vidfetch - Remote video acquisition with format fallback
//!
//! A CLI tool and library for downloading videos into a local directory
//! without ever losing the user's result to a flaky source.
//!
//! # Overview
//!
//! vidfetch allows you to:
//! - Download a video, trying a ranked list of format specs until one works
//! - Degrade to a bundled sample when the remote source cannot deliver
//! - Save files under sanitized, collision-free names
//! - Process URL lists concurrently, optionally extracting audio
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `media` - Remote source abstraction (yt-dlp) and the local fallback asset
//! - `download` - Sanitizer, format-fallback downloader, persistence placement
//! - `orchestrator` - Pipeline coordination
//! - `batch` - URL lists and concurrent batch runs
//!
//! # Example
//!
//! ```rust,no_run
//! use vidfetch::config::Settings;
//! use vidfetch::download::DownloadRequest;
//! use vidfetch::media::MediaMode;
//! use vidfetch::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings);
//!
//!     let request = DownloadRequest::new(
//!         "https://www.youtube.com/watch?v=p-d5S9JHYQQ",
//!         settings.format_chain(MediaMode::Video),
//!         settings.output_dir(),
//!     );
//!     let result = orchestrator.acquire(&request, &settings.fallback_asset()).await?;
//!     let artifact = orchestrator.placer().place(result, request.destination_dir()).await?;
//!     println!("Saved to {}", artifact.final_path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod media;
pub mod orchestrator;

pub use error::{Result, VidfetchError};
