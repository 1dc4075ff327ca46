//! Generation scheduler: list a directory, fan out to the worker pool

use crate::events::{EventPublisher, ThumbnailUpdate};
use crate::generator::{GenerateOutcome, ThumbnailGenerator};
use crate::session::{CancellationToken, SessionId};
use crate::store::CacheStore;
use crate::AppError;
use app_fs::{list_media, MediaEntry};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Outcome counts for one `generate` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub session_id: SessionId,
    /// Media entries listed in the directory
    pub listed: usize,
    /// Served from a fresh cache entry, no generation
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
    pub unsupported: usize,
    /// Skipped because the session was superseded first
    pub cancelled: usize,
}

#[derive(Default)]
struct BatchCounters {
    cached: AtomicUsize,
    generated: AtomicUsize,
    failed: AtomicUsize,
    unsupported: AtomicUsize,
    cancelled: AtomicUsize,
}

impl BatchCounters {
    fn summary(&self, session_id: SessionId, listed: usize) -> BatchSummary {
        BatchSummary {
            session_id,
            listed,
            cached: self.cached.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Schedules thumbnail generation on a fixed-size thread pool.
///
/// The pool is shared by every batch, so concurrent sessions never exceed
/// `workers` threads of decode work in total.
pub struct Scheduler {
    generator: Arc<ThumbnailGenerator>,
    store: Arc<dyn CacheStore>,
    events: EventPublisher,
    pool: rayon::ThreadPool,
}

impl Scheduler {
    pub fn new(
        generator: Arc<ThumbnailGenerator>,
        store: Arc<dyn CacheStore>,
        events: EventPublisher,
        workers: usize,
    ) -> Result<Self, AppError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("thumb-worker-{}", i))
            .build()
            .map_err(|e| AppError::Init(format!("thumbnail worker pool: {}", e)))?;

        tracing::debug!("Thumbnail scheduler started with {} workers", workers);

        Ok(Self {
            generator,
            store,
            events,
            pool,
        })
    }

    /// Generate thumbnails for every media file directly inside `dir`.
    ///
    /// Blocks until the batch is done; progress is published per file as it
    /// completes, tagged with `session_id` whether or not the session is
    /// still current. Files not yet started when `token` is cancelled are
    /// skipped without an event.
    pub fn generate(
        &self,
        dir: &Path,
        session_id: SessionId,
        token: &CancellationToken,
    ) -> Result<BatchSummary, AppError> {
        let entries = list_media(dir)?;
        let listed = entries.len();
        tracing::info!(
            session = session_id,
            dir = %dir.display(),
            files = listed,
            "Generating thumbnails"
        );

        let counters = BatchCounters::default();
        self.pool.install(|| {
            entries
                .par_iter()
                .for_each(|entry| self.process(entry, session_id, token, &counters));
        });

        let summary = counters.summary(session_id, listed);
        tracing::info!(
            session = session_id,
            cached = summary.cached,
            generated = summary.generated,
            failed = summary.failed,
            unsupported = summary.unsupported,
            cancelled = summary.cancelled,
            "Thumbnail batch finished"
        );
        Ok(summary)
    }

    fn process(
        &self,
        entry: &MediaEntry,
        session_id: SessionId,
        token: &CancellationToken,
        counters: &BatchCounters,
    ) {
        if token.is_cancelled() {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let path = entry.path.normalized();

        if !self.generator.supports(entry.kind) {
            counters.unsupported.fetch_add(1, Ordering::Relaxed);
            self.events
                .publish(ThumbnailUpdate::from_outcome(path, &GenerateOutcome::Unsupported, session_id));
            return;
        }

        if let Some(artifact) = self.fresh_artifact(entry) {
            counters.cached.fetch_add(1, Ordering::Relaxed);
            self.events.publish(ThumbnailUpdate::ready(path, &artifact, session_id));
            return;
        }

        self.events.publish(ThumbnailUpdate::loading(path, session_id));

        let outcome = self.generator.generate(&entry.path);
        let counter = match &outcome {
            GenerateOutcome::Ready(_) => &counters.generated,
            GenerateOutcome::Error(_) => &counters.failed,
            GenerateOutcome::Unsupported => &counters.unsupported,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.events
            .publish(ThumbnailUpdate::from_outcome(path, &outcome, session_id));
    }

    /// Artifact path if the cached thumbnail is at least as new as the source
    fn fresh_artifact(&self, entry: &MediaEntry) -> Option<PathBuf> {
        let source_modified = entry.modified?;
        let location = self.generator.resolver().resolve(&entry.path);
        let artifact_modified = self.store.modified(&location)?;

        (artifact_modified >= source_modified).then_some(location.path)
    }
}
