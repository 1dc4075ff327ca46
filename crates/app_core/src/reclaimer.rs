//! Orphan reclamation: delete cache entries nobody can use any more

use crate::store::{CacheStore, StoredEntry};
use crate::AppError;
use app_fs::{is_within, SourcePath};
use serde::Serialize;
use std::path::Path;

/// Result of one reclamation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    /// Artifacts deleted by this pass
    pub removed: usize,
    /// Artifacts that could not be deleted
    pub failed: usize,
    /// Manifest records dropped because their artifact was gone
    pub pruned_records: usize,
    #[serde(skip)]
    pub failures: Vec<String>,
}

impl CleanupSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Human readable failure description, if any deletion failed
    pub fn failure_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let mut message = format!("failed to delete {} cached thumbnail(s)", self.failed);
        if let Some(first) = self.failures.first() {
            message.push_str(": ");
            message.push_str(first);
        }
        Some(message)
    }

    fn delete(&mut self, store: &dyn CacheStore, entry: &StoredEntry) {
        match store.delete(&entry.relative) {
            Ok(true) => self.removed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", entry.relative, e);
                self.failed += 1;
                self.failures.push(format!("{}: {}", entry.relative, e));
            }
        }
    }
}

/// Why an entry is an orphan
fn orphan_reason(entry: &StoredEntry, roots: &[String]) -> Option<&'static str> {
    let Some(source) = entry.source.as_deref() else {
        return Some("source unknown");
    };
    if !roots.iter().any(|root| is_within(source, root)) {
        return Some("outside tracked roots");
    }
    if !Path::new(source).exists() {
        return Some("source missing");
    }
    None
}

/// Delete every entry whose source is unrecoverable, outside all `roots`, or
/// no longer on disk. With no roots every entry is outside.
pub fn cleanup_orphans(store: &dyn CacheStore, roots: &[String]) -> Result<CleanupSummary, AppError> {
    let roots: Vec<String> = roots
        .iter()
        .map(|r| SourcePath::new(r).normalized().to_string())
        .collect();

    let mut summary = CleanupSummary::default();
    for entry in store.list_all()? {
        if let Some(reason) = orphan_reason(&entry, &roots) {
            tracing::debug!("Orphan {} ({})", entry.relative, reason);
            summary.delete(store, &entry);
        }
    }
    summary.pruned_records = store.prune()?;

    tracing::info!(
        removed = summary.removed,
        failed = summary.failed,
        pruned = summary.pruned_records,
        "Orphan cleanup finished"
    );
    Ok(summary)
}

/// Delete every entry whose source is `dir` or lies beneath it, whether or
/// not the source still exists.
pub fn cleanup_for_directory(store: &dyn CacheStore, dir: &str) -> Result<CleanupSummary, AppError> {
    let dir = SourcePath::new(dir);

    let mut summary = CleanupSummary::default();
    for entry in store.list_all()? {
        let inside = entry
            .source
            .as_deref()
            .is_some_and(|source| is_within(source, dir.normalized()));
        if inside {
            summary.delete(store, &entry);
        }
    }

    tracing::info!(
        dir = dir.normalized(),
        removed = summary.removed,
        failed = summary.failed,
        "Directory cleanup finished"
    );
    Ok(summary)
}

/// Delete every entry in the store
pub fn delete_all(store: &dyn CacheStore) -> Result<CleanupSummary, AppError> {
    let mut summary = CleanupSummary::default();
    for entry in store.list_all()? {
        summary.delete(store, &entry);
    }
    summary.pruned_records = store.prune()?;

    tracing::info!(removed = summary.removed, failed = summary.failed, "Thumbnail cache wiped");
    Ok(summary)
}
