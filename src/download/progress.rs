//! Progress events emitted while a request moves through the pipeline.

use std::path::PathBuf;
use tokio::sync::mpsc;

/// Channel the CLI listens on for progress lines.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TryingFormat { url: String, format: String },
    FormatFailed { url: String, format: String, reason: String },
    Downloaded { url: String, file_name: String },
    FallingBack { url: String, asset: PathBuf, reason: String },
    Skipped { url: String, existing: PathBuf },
    Placed { url: String, path: PathBuf },
    Failed { url: String, stage: &'static str, reason: String },
}

impl ProgressEvent {
    pub fn url(&self) -> &str {
        match self {
            ProgressEvent::TryingFormat { url, .. }
            | ProgressEvent::FormatFailed { url, .. }
            | ProgressEvent::Downloaded { url, .. }
            | ProgressEvent::FallingBack { url, .. }
            | ProgressEvent::Skipped { url, .. }
            | ProgressEvent::Placed { url, .. }
            | ProgressEvent::Failed { url, .. } => url,
        }
    }

    /// True for events that report something going wrong.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ProgressEvent::FormatFailed { .. } | ProgressEvent::FallingBack { .. }
        )
    }

    /// True for the last event of a request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Skipped { .. } | ProgressEvent::Placed { .. } | ProgressEvent::Failed { .. }
        )
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressEvent::TryingFormat { format, .. } => write!(f, "Trying format '{format}'..."),
            ProgressEvent::FormatFailed { format, reason, .. } => {
                write!(f, "Format '{format}' failed: {reason}")
            }
            ProgressEvent::Downloaded { file_name, .. } => write!(f, "Downloaded {file_name}"),
            ProgressEvent::FallingBack { url, asset, reason } => write!(
                f,
                "Unable to fetch {url}: {reason}. Falling back to the bundled sample {}",
                asset.display()
            ),
            ProgressEvent::Skipped { existing, .. } => {
                write!(f, "Skipping (already exists): {}", existing.display())
            }
            ProgressEvent::Placed { path, .. } => write!(f, "Saved to {}", path.display()),
            ProgressEvent::Failed { stage, reason, .. } => write!(f, "Failed during {stage}: {reason}"),
        }
    }
}

/// Send an event if anyone is listening.
pub(crate) fn emit(sender: Option<&ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}
