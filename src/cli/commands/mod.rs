//! CLI command implementations.

mod batch;
mod config;
mod doctor;
mod download;
mod list;

pub use batch::{run_batch, BatchArgs};
pub use config::run_config;
pub use doctor::run_doctor;
pub use download::run_download;
pub use list::run_list;

use crate::cli::{FetchArgs, Output};
use crate::config::Settings;
use crate::download::ProgressEvent;
use crate::media::{FormatSpec, MediaMode};
use indicatif::ProgressBar;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::warn;

/// Request parameters shared by `download` and `batch`, resolved against settings.
struct Resolved {
    mode: MediaMode,
    formats: Vec<FormatSpec>,
    destination_dir: PathBuf,
}

impl Resolved {
    fn new(fetch: &FetchArgs, settings: &Settings) -> Self {
        let mode = if fetch.audio { MediaMode::Audio } else { MediaMode::Video };
        let formats = if fetch.formats.is_empty() {
            settings.format_chain(mode)
        } else {
            fetch.formats.iter().map(FormatSpec::new).collect()
        };
        let destination_dir = fetch
            .output_dir
            .as_deref()
            .map(Settings::expand_path)
            .unwrap_or_else(|| settings.output_dir());

        Self {
            mode,
            formats,
            destination_dir,
        }
    }
}

/// Run `work` until it finishes or Ctrl-C arrives.
///
/// On Ctrl-C the work future is dropped, which removes its temporary
/// directory and staging file and kills any yt-dlp child.
async fn until_interrupted<F: Future>(work: F) -> anyhow::Result<F::Output> {
    race_signal(work, tokio::signal::ctrl_c()).await
}

async fn race_signal<F, S>(work: F, signal: S) -> anyhow::Result<F::Output>
where
    F: Future,
    S: Future<Output = std::io::Result<()>>,
{
    let mut work = Box::pin(work);
    let interrupted = tokio::select! {
        output = &mut work => return Ok(output),
        received = signal => match received {
            Ok(()) => true,
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                false
            }
        },
    };

    if !interrupted {
        return Ok(work.await);
    }

    drop(work);
    Output::error("Cancelled. Temporary files were removed.");
    anyhow::bail!("cancelled by user")
}

/// Print progress events until every sender is gone.
///
/// With a bar, lines are printed above it and each finished request advances it.
fn spawn_printer(
    mut rx: UnboundedReceiver<ProgressEvent>,
    with_url: bool,
    bar: Option<ProgressBar>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &bar {
                Some(pb) => {
                    pb.suspend(|| Output::progress(&event, with_url));
                    if event.is_terminal() {
                        pb.inc(1);
                    }
                }
                None => Output::progress(&event, with_url),
            }
        }
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    })
}
