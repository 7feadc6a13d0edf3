//! Batch command implementation.

use super::{spawn_printer, until_interrupted, Resolved};
use crate::batch::{self, BatchJob, EntryStatus};
use crate::cli::preflight::{self, Operation};
use crate::cli::{FetchArgs, Output};
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, ProcessOptions};
use anyhow::Result;
use chrono::Local;
use console::style;

/// Command-line options of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub urls: Vec<String>,
    pub file: Option<String>,
    pub limit: Option<usize>,
    pub jobs: Option<usize>,
    pub no_skip_existing: bool,
    pub save: bool,
}

/// Run the batch command.
pub async fn run_batch(args: &BatchArgs, fetch: &FetchArgs, settings: &Settings) -> Result<()> {
    let resolved = Resolved::new(fetch, settings);

    let operation = Operation::Batch(resolved.mode);
    if let Err(e) = preflight::check(operation, settings) {
        Output::error(&e.to_string());
        Output::info("Run 'vidfetch doctor' for detailed diagnostics.");
        if preflight::is_blocking(operation) {
            return Err(e.into());
        }
    }

    let list_path = args
        .file
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(|| settings.urls_file());

    let from_file = batch::load_urls(&list_path)?;
    let merged = batch::merge_urls(&from_file, &args.urls);

    if args.save && !args.urls.is_empty() {
        batch::save_urls(&list_path, &merged)?;
        Output::info(&format!("Saved {} URL(s) to {}", merged.len(), list_path.display()));
    }

    let limit = args.limit.or(settings.batch.limit);
    let selected: Vec<String> = match limit {
        Some(n) => merged.into_iter().take(n).collect(),
        None => merged,
    };

    let mut invalid = Vec::new();
    let urls: Vec<String> = selected
        .into_iter()
        .filter(|url| match batch::validate_url(url) {
            Ok(_) => true,
            Err(e) => {
                Output::warning(&e.to_string());
                invalid.push(url.clone());
                false
            }
        })
        .collect();

    if urls.is_empty() && invalid.is_empty() {
        Output::info(&format!(
            "No URLs to process. Add them to {} or pass them on the command line.",
            list_path.display()
        ));
        return Ok(());
    }

    let job = BatchJob {
        formats: resolved.formats,
        destination_dir: resolved.destination_dir,
        mode: resolved.mode,
        options: ProcessOptions {
            skip_existing: settings.batch.skip_existing && !args.no_skip_existing,
            fallback_asset: fetch.fallback.as_deref().map(Settings::expand_path),
        },
        concurrency: args.jobs.unwrap_or(settings.batch.concurrency),
    };

    Output::header(&format!(
        "Batch started {} ({} URL(s), mode: {})",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        urls.len(),
        job.mode
    ));
    Output::kv("Destination", &job.destination_dir.display().to_string());
    println!();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let bar = Output::progress_bar(urls.len() as u64, "URLs processed");
    let printer = spawn_printer(rx, true, Some(bar));
    let orchestrator = Orchestrator::new(settings).with_progress(tx);

    let report = until_interrupted(batch::run_batch(&orchestrator, &urls, &job)).await?;
    drop(orchestrator);
    let _ = printer.await;

    Output::header("Results");
    for entry in &report.entries {
        let detail = match &entry.status {
            EntryStatus::Placed(path) | EntryStatus::Degraded(path) | EntryStatus::Skipped(path) => {
                path.display().to_string()
            }
            EntryStatus::Failed { stage, reason } => format!("{}: {}", stage, reason),
        };
        let label = match entry.status {
            EntryStatus::Failed { .. } => style(entry.status.label()).red(),
            EntryStatus::Degraded(_) => style(entry.status.label()).yellow(),
            _ => style(entry.status.label()).green(),
        };
        Output::list_item(&format!("[{}] {} -> {}", label, entry.url, detail));
    }
    for url in &invalid {
        Output::list_item(&format!("[{}] {} -> input: not a valid URL", style("failed").red(), url));
    }

    let failed = report.failed() + invalid.len();
    println!();
    Output::kv("Total", &(report.total() + invalid.len()).to_string());
    Output::kv("Successful", &report.successful().to_string());
    Output::kv("Skipped", &report.skipped().to_string());
    Output::kv("Failed", &failed.to_string());

    if failed > 0 {
        Output::error(&format!("{} URL(s) failed.", failed));
        anyhow::bail!("{} of {} URL(s) failed", failed, report.total() + invalid.len());
    }

    Output::success("Batch complete.");
    Ok(())
}
