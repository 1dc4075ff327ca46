//! Cache store: the persisted tree of thumbnail artifacts

use crate::resolver::{is_artifact_relative, CacheLocation};
use crate::AppError;
use app_db::Manifest;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Temp files older than this belong to a crashed writer
const STALE_TEMP_AGE: Duration = Duration::from_secs(10 * 60);

/// A manifest row younger than this may belong to a write that has not
/// renamed its artifact into place yet
const RECORD_GRACE: Duration = STALE_TEMP_AGE;

/// One artifact found in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Path relative to the cache root, '/'-separated
    pub relative: String,
    /// Absolute artifact path
    pub path: PathBuf,
    /// Recorded source path; `None` if it cannot be recovered
    pub source: Option<String>,
}

/// Storage seam for thumbnail artifacts.
///
/// Writes must be atomic: readers, including `list_all`, observe either the
/// previous artifact or the complete new one.
pub trait CacheStore: Send + Sync {
    fn root(&self) -> &Path;

    fn exists(&self, location: &CacheLocation) -> bool {
        self.modified(location).is_some()
    }

    /// Modification time of the stored artifact
    fn modified(&self, location: &CacheLocation) -> Option<SystemTime>;

    /// Persist an artifact and record its source; returns the artifact path
    fn write(&self, location: &CacheLocation, bytes: &[u8]) -> Result<PathBuf, AppError>;

    /// Delete by relative path; `Ok(false)` if it was already gone
    fn delete(&self, relative: &str) -> Result<bool, AppError>;

    /// Every stored artifact with its recovered source
    fn list_all(&self) -> Result<Vec<StoredEntry>, AppError>;

    /// Drop bookkeeping that no longer points at an artifact; returns the
    /// number of records removed
    fn prune(&self) -> Result<usize, AppError>;
}

/// File-system store rooted at the cache directory, with a SQLite manifest
/// for source recovery.
pub struct DiskCacheStore {
    root: PathBuf,
    manifest: Manifest,
    record_grace: Duration,
}

impl DiskCacheStore {
    /// Open (creating if needed) the store at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        ensure_dir(&root)?;
        let manifest = Manifest::open(&root)?;

        tracing::info!("Thumbnail cache opened at {:?}", root);
        Ok(Self {
            root,
            manifest,
            record_grace: RECORD_GRACE,
        })
    }

    /// Minimum age before `prune` may drop a row whose artifact is missing
    pub fn with_record_grace(mut self, grace: Duration) -> Self {
        self.record_grace = grace;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn relative_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

impl CacheStore for DiskCacheStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn modified(&self, location: &CacheLocation) -> Option<SystemTime> {
        fs::metadata(&location.path).and_then(|m| m.modified()).ok()
    }

    fn write(&self, location: &CacheLocation, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let parent = location.path.parent().ok_or_else(|| {
            AppError::CacheWrite(format!("no parent directory: {}", location.path.display()))
        })?;
        fs::create_dir_all(parent)
            .map_err(|e| AppError::CacheWrite(format!("{}: {}", parent.display(), e)))?;

        // Record before the rename: a visible artifact always has a source
        self.manifest
            .record(&location.relative, location.source.normalized())?;

        write_atomic(&location.path, bytes)
            .map_err(|e| AppError::CacheWrite(format!("{}: {}", location.path.display(), e)))?;

        Ok(location.path.clone())
    }

    fn delete(&self, relative: &str) -> Result<bool, AppError> {
        if !is_artifact_relative(relative) {
            return Err(AppError::InvalidPath(format!("not a cache artifact: {}", relative)));
        }

        // Row first: a concurrent rewrite re-records after this point, and a
        // row without an artifact is harmless
        self.manifest.remove(relative)?;

        let path = self.root.join(relative);
        let existed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(AppError::CacheWrite(format!(
                    "cannot delete {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(existed)
    }

    fn list_all(&self) -> Result<Vec<StoredEntry>, AppError> {
        let mut found = Vec::new();

        // <size>/<hh>/<key>.<ext>
        for entry in WalkDir::new(&self.root).min_depth(3).max_depth(3) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("Skipping unreadable cache entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = self.relative_of(entry.path()) else {
                continue;
            };
            if is_artifact_relative(&relative) {
                found.push((relative, entry.into_path()));
            }
        }

        // Read after the walk: every artifact seen was recorded before its
        // rename, so its row is already visible here
        let sources: HashMap<String, String> = self
            .manifest
            .all()?
            .into_iter()
            .map(|r| (r.artifact, r.source))
            .collect();

        let mut entries: Vec<StoredEntry> = found
            .into_iter()
            .map(|(relative, path)| StoredEntry {
                source: sources.get(&relative).cloned(),
                relative,
                path,
            })
            .collect();

        entries.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(entries)
    }

    fn prune(&self) -> Result<usize, AppError> {
        let mut pruned = 0;
        let now = SystemTime::now();
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let grace_secs = self.record_grace.as_secs();

        for record in self.manifest.all()? {
            let age = now_secs.saturating_sub(u64::try_from(record.recorded_at).unwrap_or(0));
            if age < grace_secs || self.root.join(&record.artifact).exists() {
                continue;
            }
            if self.manifest.remove(&record.artifact)? {
                pruned += 1;
            }
        }

        for entry in WalkDir::new(&self.root).min_depth(3).max_depth(3).into_iter().flatten() {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"));
            if !is_temp {
                continue;
            }

            let stale = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| now.duration_since(t).ok())
                .is_some_and(|age| age > STALE_TEMP_AGE);
            if stale {
                match fs::remove_file(entry.path()) {
                    Ok(()) => tracing::debug!("Removed stale temp file {:?}", entry.path()),
                    Err(e) => tracing::warn!("Failed to remove temp file {:?}: {}", entry.path(), e),
                }
            }
        }

        if pruned > 0 {
            tracing::info!("Pruned {} manifest records without artifacts", pruned);
        }
        Ok(pruned)
    }
}

/// Write to a sibling temp file, flush, then rename over `dest`
fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(dest);

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Create `dir` if needed and verify it is writable
pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(AppError::CacheWrite(format!(
                "cache path exists but is not a directory: {}",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::CacheWrite(format!("failed to create {}: {}", dir.display(), e))
        })?;
    }

    let probe = dir.join(format!(".write_test.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&probe, b"").map_err(|e| {
        AppError::CacheWrite(format!("cache directory is not writable {}: {}", dir.display(), e))
    })?;
    let _ = fs::remove_file(&probe);

    Ok(())
}

struct MemoryArtifact {
    source: String,
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// In-memory store with the same contract, for tests and dry runs
pub struct MemoryCacheStore {
    root: PathBuf,
    artifacts: DashMap<String, MemoryArtifact>,
    writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: DashMap::new(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Total successful writes since creation
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn bytes(&self, relative: &str) -> Option<Vec<u8>> {
        self.artifacts.get(relative).map(|a| a.bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn modified(&self, location: &CacheLocation) -> Option<SystemTime> {
        self.artifacts.get(&location.relative).map(|a| a.modified)
    }

    fn write(&self, location: &CacheLocation, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let artifact = MemoryArtifact {
            source: location.source.normalized().to_string(),
            bytes: bytes.to_vec(),
            modified: SystemTime::now(),
        };

        match self.artifacts.entry(location.relative.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().source != artifact.source {
                    return Err(AppError::CacheKeyCollision {
                        artifact: location.relative.clone(),
                        existing: slot.get().source.clone(),
                    });
                }
                slot.insert(artifact);
            }
            Entry::Vacant(slot) => {
                slot.insert(artifact);
            }
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(location.path.clone())
    }

    fn delete(&self, relative: &str) -> Result<bool, AppError> {
        Ok(self.artifacts.remove(relative).is_some())
    }

    fn list_all(&self) -> Result<Vec<StoredEntry>, AppError> {
        let mut entries: Vec<StoredEntry> = self
            .artifacts
            .iter()
            .map(|a| StoredEntry {
                relative: a.key().clone(),
                path: self.root.join(a.key()),
                source: Some(a.source.clone()),
            })
            .collect();
        entries.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(entries)
    }

    fn prune(&self) -> Result<usize, AppError> {
        Ok(0)
    }
}
