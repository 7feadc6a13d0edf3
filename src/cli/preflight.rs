//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools are available before starting operations
//! that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, VidfetchError};
use crate::media::MediaMode;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A single download degrades to the sample, so missing tools are only reported.
    Download(MediaMode),
    /// A batch would fail every URL, so it requires yt-dlp (and ffmpeg for audio).
    Batch(MediaMode),
    /// Listing touches only the filesystem.
    List,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Download(mode) | Operation::Batch(mode) => {
            check_tool(&settings.download.ytdlp_path)?;
            if mode == MediaMode::Audio {
                check_tool("ffmpeg")?;
            }
        }
        Operation::List => {}
    }
    Ok(())
}

/// Whether a failed check should stop the operation.
pub fn is_blocking(operation: Operation) -> bool {
    matches!(operation, Operation::Batch(_))
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg uses -version (single dash), others use --version
    let version_arg = if name.ends_with("ffmpeg") { "-version" } else { "--version" };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(VidfetchError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidfetchError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(VidfetchError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
