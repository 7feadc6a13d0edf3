//! Batch processing of URL lists.
//!
//! Each URL runs its own full lifecycle through the [`Orchestrator`]; only the
//! destination directory is shared, and placement guards it.

use crate::download::DownloadRequest;
use crate::error::{Result, VidfetchError};
use crate::media::{FormatSpec, MediaMode};
use crate::orchestrator::{Orchestrator, Outcome, ProcessOptions};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Split file content into URLs: one per line, trimmed, blanks dropped.
pub fn parse_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that `raw` parses as an absolute URL.
pub fn validate_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| VidfetchError::InvalidInput(format!("'{}' is not a valid URL: {}", raw, e)))
}

/// Load a URL list. A missing file is an empty list.
pub fn load_urls(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_urls(&content))
}

/// Write a URL list, one per line.
pub fn save_urls(path: &Path, urls: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, urls.join("\n"))?;
    Ok(())
}

/// Concatenate both lists, keeping the first occurrence of each URL.
pub fn merge_urls(existing: &[String], added: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(added)
        .filter(|url| seen.insert(*url))
        .cloned()
        .collect()
}

/// Settings shared by every request in a batch.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub formats: Vec<FormatSpec>,
    pub destination_dir: PathBuf,
    pub mode: MediaMode,
    pub options: ProcessOptions,
    pub concurrency: usize,
}

/// How one URL ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Placed(PathBuf),
    Degraded(PathBuf),
    Skipped(PathBuf),
    Failed { stage: String, reason: String },
}

impl EntryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Placed(_) => "placed",
            EntryStatus::Degraded(_) => "degraded",
            EntryStatus::Skipped(_) => "skipped",
            EntryStatus::Failed { .. } => "failed",
        }
    }
}

impl From<Outcome> for EntryStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Placed { artifact, degraded: false } => EntryStatus::Placed(artifact.final_path),
            Outcome::Placed { artifact, degraded: true } => EntryStatus::Degraded(artifact.final_path),
            Outcome::Skipped { existing } => EntryStatus::Skipped(existing),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub url: String,
    pub status: EntryStatus,
}

/// Per-URL results, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Placed or degraded.
    pub fn successful(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Placed(_) | EntryStatus::Degraded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&EntryStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }
}

/// Process `urls` with at most `job.concurrency` requests in flight.
pub async fn run_batch(orchestrator: &Orchestrator, urls: &[String], job: &BatchJob) -> BatchReport {
    let width = job.concurrency.max(1);
    info!("Processing {} URL(s), {} at a time", urls.len(), width);

    let mut results: Vec<(usize, BatchEntry)> = stream::iter(urls.iter().enumerate())
        .map(|(idx, url)| async move {
            let request = DownloadRequest::new(url.clone(), job.formats.clone(), &job.destination_dir)
                .with_mode(job.mode);

            let status = match orchestrator.process(&request, &job.options).await {
                Ok(outcome) => EntryStatus::from(outcome),
                Err(e) => {
                    warn!("Failed to process {}: {}", url, e);
                    EntryStatus::Failed {
                        stage: e.stage().to_string(),
                        reason: e.to_string(),
                    }
                }
            };

            (
                idx,
                BatchEntry {
                    url: url.clone(),
                    status,
                },
            )
        })
        .buffer_unordered(width)
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);

    BatchReport {
        entries: results.into_iter().map(|(_, entry)| entry).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Placer;
    use crate::media::testing::ScriptedBackend;
    use std::sync::Arc;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_urls() {
        let content = "  https://a.example/1  \n\n\thttps://b.example/2\n   \n";
        assert_eq!(parse_urls(content), strings(&["https://a.example/1", "https://b.example/2"]));
        assert!(parse_urls("").is_empty());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://www.youtube.com/watch?v=p-d5S9JHYQQ").is_ok());
        let err = tokio_test::assert_err!(validate_url("not a url"));
        assert_eq!(err.stage(), "input");
    }

    #[test]
    fn test_merge_urls_dedupes_in_order() {
        let existing = strings(&["a", "b", "a"]);
        let added = strings(&["c", "b", "d"]);
        assert_eq!(merge_urls(&existing, &added), strings(&["a", "b", "c", "d"]));
    }

    #[test]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists").join("urls.txt");

        assert!(tokio_test::assert_ok!(load_urls(&path)).is_empty());

        let urls = strings(&["https://a.example/1", "https://b.example/2"]);
        tokio_test::assert_ok!(save_urls(&path, &urls));
        assert_eq!(tokio_test::assert_ok!(load_urls(&path)), urls);
    }

    #[tokio::test]
    async fn test_run_batch_reports_in_input_order() {
        let temp_root = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(dest.path().join("Clip-c1.mp4"), b"old").unwrap();

        let backend = Arc::new(
            ScriptedBackend::new()
                .with_probe("Clip", "c1")
                .succeed("best", Some("Clip"), Some("c1"), "mp4"),
        );
        let orchestrator = Orchestrator::with_components(backend, temp_root.path(), Placer::default());

        let job = BatchJob {
            formats: vec![FormatSpec::new("best")],
            destination_dir: dest.path().to_path_buf(),
            mode: MediaMode::Video,
            options: ProcessOptions {
                skip_existing: true,
                fallback_asset: None,
            },
            concurrency: 3,
        };

        let urls = strings(&["u1", "u2"]);
        let report = run_batch(&orchestrator, &urls, &job).await;

        assert_eq!(report.total(), 2);
        assert_eq!(report.entries[0].url, "u1");
        assert_eq!(report.entries[1].url, "u2");
        // The probe predicts an existing file for every URL.
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.successful(), 0);
    }

    #[tokio::test]
    async fn test_run_batch_counts_failures_and_distinct_files() {
        let temp_root = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let backend = Arc::new(ScriptedBackend::new().succeed("best", Some("Clip"), Some("c1"), "mp4"));
        let orchestrator = Orchestrator::with_components(backend, temp_root.path(), Placer::default());

        let mut job = BatchJob {
            formats: vec![FormatSpec::new("best")],
            destination_dir: dest.path().to_path_buf(),
            mode: MediaMode::Video,
            options: ProcessOptions::default(),
            concurrency: 4,
        };

        let urls = strings(&["u1", "u2", "u3"]);
        let report = run_batch(&orchestrator, &urls, &job).await;
        assert_eq!(report.successful(), 3);
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 3);

        job.formats = vec![FormatSpec::new("unscripted")];
        let report = run_batch(&orchestrator, &strings(&["u4"]), &job).await;
        assert_eq!(report.failed(), 1);
        match &report.entries[0].status {
            EntryStatus::Failed { stage, .. } => assert_eq!(stage, "download"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
