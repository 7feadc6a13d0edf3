//! List command implementation.

use crate::cli::{format_size, Output};
use crate::config::Settings;
use crate::download::STAGING_SUFFIX;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One finished file in the destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// Run the list command.
pub fn run_list(output_dir: Option<&str>, settings: &Settings) -> Result<()> {
    let dir: PathBuf = output_dir
        .map(Settings::expand_path)
        .unwrap_or_else(|| settings.output_dir());

    if !dir.is_dir() {
        Output::info(&format!(
            "No downloads yet: {} does not exist. Use 'vidfetch download <url>' to add one.",
            dir.display()
        ));
        return Ok(());
    }

    let files = list_files(&dir)?;
    if files.is_empty() {
        Output::info(&format!("{} is empty.", dir.display()));
        return Ok(());
    }

    Output::header(&format!("Downloads ({})", files.len()));
    println!();

    for file in &files {
        let modified: DateTime<Local> = file.modified.into();
        Output::file_entry(&file.name, file.size, &modified.format("%Y-%m-%d %H:%M").to_string());
    }

    let total: u64 = files.iter().map(|f| f.size).sum();
    println!();
    Output::kv("Directory", &dir.display().to_string());
    Output::kv("Total size", &format_size(total));

    Ok(())
}

/// Regular files in `dir`, newest first, without in-flight staging files.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<ListedFile>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if is_staging(&name) {
            continue;
        }

        files.push(ListedFile {
            name,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}
