//! Persistence placement.
//!
//! Copies an acquired file into the destination directory under a name that
//! never overwrites an existing file, then releases the result's temporary
//! directory whatever the outcome.

use super::sanitize::{sanitize_bounded, DEFAULT_MAX_LENGTH, MAX_NAME_BYTES};
use super::DownloadResult;
use crate::error::{Result, VidfetchError};
use crate::media::{MediaMetadata, DEFAULT_EXTENSION};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Bytes of a file name kept free for `-N` and `.ext`.
const NAME_RESERVE: usize = 24;

/// Longest id kept in a file name, in bytes.
const MAX_ID_BYTES: usize = 64;

/// Suffix of the hidden staging files written before the final name appears.
pub const STAGING_SUFFIX: &str = ".part";

/// A file placed at its final location. Owned by the caller from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub final_path: PathBuf,
    pub bytes: u64,
}

type Reserved = Arc<Mutex<HashSet<PathBuf>>>;

/// Places acquired files into destination directories.
///
/// One placer should be shared by every request writing into the same
/// directory: it keeps the set of final paths that are currently being
/// written, so two requests resolving to the same name never both see the
/// same free slot.
#[derive(Debug, Clone)]
pub struct Placer {
    max_title_length: usize,
    reserved: Reserved,
}

impl Default for Placer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl Placer {
    pub fn new(max_title_length: usize) -> Self {
        Self {
            max_title_length,
            reserved: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Base name (no extension) for a file with this metadata.
    ///
    /// Sanitized title, or the fallback stem when the title is missing, then
    /// `-<id>` when an id is known.
    ///
    /// The result leaves room for a collision suffix and an extension within
    /// [`MAX_NAME_BYTES`].
    pub fn base_name(&self, metadata: &MediaMetadata, fallback_stem: &str) -> String {
        let title = metadata.title.as_deref().unwrap_or(fallback_stem);
        let safe_id = metadata
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| sanitize_bounded(id, self.max_title_length, MAX_ID_BYTES));

        let id_bytes = safe_id.as_ref().map_or(0, |id| id.len() + 1);
        let title_budget = MAX_NAME_BYTES - NAME_RESERVE - id_bytes;
        let safe_title = sanitize_bounded(title, self.max_title_length, title_budget);

        match safe_id {
            Some(id) => format!("{}-{}", safe_title, id),
            None => safe_title,
        }
    }

    /// File name a fresh download with this metadata would get in an empty directory.
    pub fn predicted_name(&self, metadata: &MediaMetadata, fallback_stem: &str, extension: &str) -> String {
        join_name(&self.base_name(metadata, fallback_stem), 0, extension)
    }

    /// Copy `result` into `destination_dir` and release its temporary directory.
    #[instrument(skip(self, result), fields(source = %result.path().display()))]
    pub async fn place(&self, result: DownloadResult, destination_dir: &Path) -> Result<PersistedArtifact> {
        let outcome = self.copy_into(&result, destination_dir).await;
        result.cleanup();
        outcome
    }

    async fn copy_into(&self, result: &DownloadResult, destination_dir: &Path) -> Result<PersistedArtifact> {
        let persistence = |source: std::io::Error| VidfetchError::PersistenceFailure {
            dir: destination_dir.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(persistence)?;

        let source = result.path();
        let fallback_stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(super::PLACEHOLDER);
        let base = self.base_name(result.metadata(), fallback_stem);
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| file_extension(&result.metadata().extension));

        let mut staging = StagingFile::new(destination_dir);
        let bytes = tokio::fs::copy(source, staging.path())
            .await
            .map_err(persistence)?;

        let mut next_suffix = 0;
        loop {
            let reservation = self.reserve(destination_dir, &base, &extension, next_suffix);
            let final_path = reservation.path.clone();

            let published = publish(staging.path(), &final_path).await;
            match published {
                Ok(()) => {
                    staging.commit();
                    info!("Placed {:?} ({} bytes)", final_path, bytes);
                    return Ok(PersistedArtifact { final_path, bytes });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{:?} appeared while placing, trying the next name", final_path);
                    next_suffix = reservation.suffix + 1;
                }
                Err(e) => return Err(persistence(e)),
            }
        }
    }

    /// Claim the first free name at or after `start`.
    fn reserve(&self, dir: &Path, base: &str, extension: &str, start: u32) -> Reservation {
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());

        let mut suffix = start;
        loop {
            let candidate = dir.join(join_name(base, suffix, extension));
            if !reserved.contains(&candidate) && !candidate.exists() {
                reserved.insert(candidate.clone());
                return Reservation {
                    path: candidate,
                    suffix,
                    reserved: self.reserved.clone(),
                };
            }
            suffix += 1;
        }
    }
}

/// `base.ext`, or `base-N.ext` for N > 0.
fn join_name(base: &str, suffix: u32, extension: &str) -> String {
    let stem = if suffix == 0 {
        base.to_string()
    } else {
        format!("{base}-{suffix}")
    };

    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

fn file_extension(reported: &str) -> String {
    let ext = reported.trim().trim_start_matches('.');
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext.to_string()
    }
}

/// Move the fully written staging file to `final_path` without ever replacing a file.
///
/// A hard link fails atomically when the target exists. Filesystems without
/// hard links get a checked rename instead.
async fn publish(staging: &Path, final_path: &Path) -> std::io::Result<()> {
    match tokio::fs::hard_link(staging, final_path).await {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(staging).await {
                warn!("Failed to remove staging file {:?}: {}", staging, e);
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            debug!("Hard link unavailable ({}), renaming instead", e);
            if tokio::fs::try_exists(final_path).await? {
                return Err(std::io::Error::new(ErrorKind::AlreadyExists, "target exists"));
            }
            tokio::fs::rename(staging, final_path).await
        }
    }
}

/// A claimed final path, released when dropped.
struct Reservation {
    path: PathBuf,
    suffix: u32,
    reserved: Reserved,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        reserved.remove(&self.path);
    }
}

/// Hidden file receiving the copy; removed on drop unless committed.
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(dir: &Path) -> Self {
        let name = format!(".vidfetch-{}{}", uuid::Uuid::new_v4(), STAGING_SUFFIX);
        Self {
            path: dir.join(name),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove staging file {:?}: {}", self.path, e);
            }
        }
    }
}
