//! Archive persistence: the single JSON document, its backups, and the
//! merge that makes repeated harvest runs idempotent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::model::Post;

const BACKUP_PREFIX: &str = "posts_backup_";
const BACKUP_SUFFIX: &str = ".json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read archive {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse archive {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to back up archive to {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write archive {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counts reported after a merge-and-save.
#[derive(Debug, Clone, Copy)]
pub struct MergeSummary {
    pub existing: usize,
    pub added: usize,
    pub total: usize,
}

/// Accessor for the archive JSON document.
///
/// The archive is always rewritten in full; before each overwrite the prior
/// file is copied to a timestamp-suffixed sibling. Retention of those backups
/// is configurable; zero keeps all of them.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
    backup_retention: usize,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(path: PathBuf, backup_retention: usize) -> Self {
        Self {
            path,
            backup_retention,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the archive. A missing file is an empty archive, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Vec<Post>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No existing archive, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Back up the current archive (if any) and write `posts` in full.
    ///
    /// A failed write never touches in-memory state; the caller may retry
    /// without re-harvesting.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup copy or the write fails.
    pub async fn save(&self, posts: &[Post]) -> Result<(), StoreError> {
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup_path = self.backup_path(Utc::now().naive_utc());
            fs::copy(&self.path, &backup_path)
                .await
                .map_err(|e| StoreError::Backup {
                    path: backup_path.clone(),
                    source: e,
                })?;
            debug!(path = %backup_path.display(), "Archive backed up");
        }

        let json = serde_json::to_vec_pretty(posts).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: e.into(),
        })?;
        fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Write {
                path: self.path.clone(),
                source: e,
            })?;

        // Retention pruning is best-effort; a failed prune never fails a save.
        if let Err(e) = self.prune_backups().await {
            warn!("Failed to prune old backups: {e}");
        }

        Ok(())
    }

    /// Load, merge, and save in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be loaded or written.
    pub async fn save_merged(&self, new_posts: &[Post]) -> Result<MergeSummary, StoreError> {
        let existing = self.load().await?;
        let existing_count = existing.len();
        let merged = merge(existing, new_posts.to_vec());
        let summary = MergeSummary {
            existing: existing_count,
            added: merged.len() - existing_count,
            total: merged.len(),
        };

        self.save(&merged).await?;
        info!(
            existing = summary.existing,
            added = summary.added,
            total = summary.total,
            "Archive saved"
        );
        Ok(summary)
    }

    fn backup_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        let name = format!(
            "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
            timestamp.format(BACKUP_TIMESTAMP_FORMAT)
        );
        self.path.with_file_name(name)
    }

    /// Delete backups beyond the retention count, oldest first.
    async fn prune_backups(&self) -> Result<(), std::io::Error> {
        if self.backup_retention == 0 {
            return Ok(());
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut backups: Vec<(NaiveDateTime, PathBuf)> = Vec::new();

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(timestamp) = parse_backup_name(name) {
                backups.push((timestamp, entry.path()));
            }
        }

        if backups.len() <= self.backup_retention {
            return Ok(());
        }

        backups.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in &backups[self.backup_retention..] {
            debug!(path = %path.display(), "Deleting old backup");
            if let Err(e) = fs::remove_file(path).await {
                warn!(path = %path.display(), "Failed to delete backup: {e}");
            }
        }

        Ok(())
    }
}

/// Parse a backup file name to its timestamp.
fn parse_backup_name(name: &str) -> Option<NaiveDateTime> {
    let timestamp = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(timestamp, BACKUP_TIMESTAMP_FORMAT).ok()
}

/// Merge freshly harvested posts into the existing archive.
///
/// Ids already present in the archive win; their batch duplicates are dropped,
/// not overwritten. The result is ordered newest `saved_at` first, with the id
/// as a deterministic tie-break.
#[must_use]
pub fn merge(existing: Vec<Post>, new_posts: Vec<Post>) -> Vec<Post> {
    let existing_ids: HashSet<&str> = existing.iter().map(|p| p.id.as_str()).collect();

    let unique_new: Vec<Post> = new_posts
        .into_iter()
        .filter(|p| !existing_ids.contains(p.id.as_str()))
        .collect();
    drop(existing_ids);

    let mut merged = existing;
    merged.extend(unique_new);
    merged.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.id.cmp(&a.id)));
    merged
}
