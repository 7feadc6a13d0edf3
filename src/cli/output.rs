//! CLI output formatting utilities.

use crate::download::ProgressEvent;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print a warning that belongs to normal progress output (stdout).
    pub fn notice(msg: &str) {
        println!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one file of a directory listing.
    pub fn file_entry(name: &str, size: u64, modified: &str) {
        println!(
            "  {} {} ({}, {})",
            style("*").cyan(),
            style(name).bold(),
            format_size(size),
            style(modified).dim()
        );
    }

    /// Print a pipeline progress event, prefixed with its URL when `with_url` is set.
    pub fn progress(event: &ProgressEvent, with_url: bool) {
        let line = if with_url {
            format!("[{}] {}", style(event.url()).dim(), event)
        } else {
            event.to_string()
        };

        match event {
            _ if is_unrecoverable(event) => Self::error(&line),
            ProgressEvent::Placed { .. } => Self::success(&line),
            _ if event.is_warning() => Self::notice(&line),
            _ => Self::info(&line),
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(template) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(template.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }
}

/// Only a request's final failure goes to stderr; retries and fallbacks are progress.
fn is_unrecoverable(event: &ProgressEvent) -> bool {
    matches!(event, ProgressEvent::Failed { .. })
}

/// Format file size in human-readable format.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_final_failure_is_unrecoverable() {
        let attempt = ProgressEvent::FormatFailed {
            url: "u".to_string(),
            format: "fmt_A".to_string(),
            reason: "HTTP 403".to_string(),
        };
        let fallback = ProgressEvent::FallingBack {
            url: "u".to_string(),
            asset: "sample.mp4".into(),
            reason: "all formats failed".to_string(),
        };
        let failed = ProgressEvent::Failed {
            url: "u".to_string(),
            stage: "download",
            reason: "boom".to_string(),
        };

        assert!(!is_unrecoverable(&attempt));
        assert!(!is_unrecoverable(&fallback));
        assert!(is_unrecoverable(&failed));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
