//! Download command implementation.

use super::{spawn_printer, until_interrupted, Resolved};
use crate::batch::validate_url;
use crate::cli::preflight::{self, Operation};
use crate::cli::{format_size, FetchArgs, Output};
use crate::config::Settings;
use crate::download::DownloadRequest;
use crate::orchestrator::{Orchestrator, Outcome, ProcessOptions};
use anyhow::Result;

/// Run the download command.
pub async fn run_download(
    url: Option<&str>,
    fetch: &FetchArgs,
    skip_existing: bool,
    settings: &Settings,
) -> Result<()> {
    let url = url.unwrap_or(&settings.download.sample_url);
    if let Err(e) = validate_url(url) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let resolved = Resolved::new(fetch, settings);

    // A missing tool is not fatal here: the bundled sample still applies.
    if let Err(e) = preflight::check(Operation::Download(resolved.mode), settings) {
        Output::warning(&e.to_string());
        Output::info("Run 'vidfetch doctor' for detailed diagnostics.");
    }

    let fallback_asset = fetch
        .fallback
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(|| settings.fallback_asset());

    Output::info(&format!("Processing: {}", url));

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = spawn_printer(rx, false, None);
    let orchestrator = Orchestrator::new(settings).with_progress(tx);

    let request = DownloadRequest::new(url, resolved.formats, resolved.destination_dir).with_mode(resolved.mode);
    let options = ProcessOptions {
        skip_existing,
        fallback_asset: Some(fallback_asset),
    };

    let outcome = until_interrupted(orchestrator.process(&request, &options)).await?;
    drop(orchestrator);
    let _ = printer.await;

    match outcome {
        Ok(Outcome::Placed { artifact, degraded }) => {
            if degraded {
                Output::warning("The remote source was unavailable; the bundled sample was saved instead.");
            }
            Output::kv("File", &artifact.final_path.display().to_string());
            Output::kv("Size", &format_size(artifact.bytes));
            Ok(())
        }
        Ok(Outcome::Skipped { existing }) => {
            Output::kv("Existing file", &existing.display().to_string());
            Ok(())
        }
        // The printer already reported the failing stage.
        Err(e) => Err(e.into()),
    }
}
