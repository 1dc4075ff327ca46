//! Command surface exposed to the frontend.
//!
//! Each command runs the blocking engine call on tokio's blocking pool and
//! returns either a summary or a `CommandError` carrying a human readable
//! message.

use crate::reclaimer::CleanupSummary;
use crate::scheduler::BatchSummary;
use crate::service::ThumbnailService;
use crate::session::SessionId;
use crate::AppError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const GENERATE_THUMBNAILS: &str = "generate_thumbnails";
pub const CLEANUP_ORPHAN_THUMBNAILS: &str = "cleanup_orphan_thumbnails";
pub const CLEANUP_THUMBNAILS_FOR_DIR: &str = "cleanup_thumbnails_for_dir";
pub const DELETE_ALL_THUMBNAILS: &str = "delete_all_thumbnails";

/// Failure returned to the caller of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<AppError> for CommandError {
    fn from(err: AppError) -> Self {
        Self::new(err.user_message())
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

async fn run_blocking<T, F>(name: &'static str, job: F) -> CommandResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if e.is_recoverable() {
                tracing::warn!(command = name, "Command failed: {}", e);
            } else {
                tracing::error!(command = name, "Command failed: {}", e);
            }
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(command = name, "Command task aborted: {}", e);
            Err(CommandError::new(format!("{} did not complete", name)))
        }
    }
}

/// Partial failures still fail the command
fn cleanup_result(summary: CleanupSummary) -> CommandResult<CleanupSummary> {
    match summary.failure_message() {
        Some(message) => Err(CommandError::new(message)),
        None => Ok(summary),
    }
}

/// Generate thumbnails for every media file in `dir`, streaming
/// `thumbnail-update` events tagged with `session_id`
pub async fn generate_thumbnails(
    service: Arc<ThumbnailService>,
    dir: String,
    session_id: SessionId,
) -> CommandResult<BatchSummary> {
    run_blocking(GENERATE_THUMBNAILS, move || {
        service.generate_for_dir(&dir, session_id)
    })
    .await
}

/// Reclaim orphaned thumbnails, in `cache_base_dir` if given
pub async fn cleanup_orphan_thumbnails(
    service: Arc<ThumbnailService>,
    cache_base_dir: Option<PathBuf>,
) -> CommandResult<CleanupSummary> {
    let summary = run_blocking(CLEANUP_ORPHAN_THUMBNAILS, move || match cache_base_dir {
        Some(root) => service.cleanup_orphans_in(&root),
        None => service.cleanup_orphans(),
    })
    .await?;
    cleanup_result(summary)
}

/// Delete every thumbnail whose source is under `dir`
pub async fn cleanup_thumbnails_for_dir(
    service: Arc<ThumbnailService>,
    dir: String,
) -> CommandResult<CleanupSummary> {
    let summary = run_blocking(CLEANUP_THUMBNAILS_FOR_DIR, move || {
        service.cleanup_for_dir(&dir)
    })
    .await?;
    cleanup_result(summary)
}

/// Wipe the cache, in `cache_base_dir` if given
pub async fn delete_all_thumbnails(
    service: Arc<ThumbnailService>,
    cache_base_dir: Option<PathBuf>,
) -> CommandResult<CleanupSummary> {
    let summary = run_blocking(DELETE_ALL_THUMBNAILS, move || match cache_base_dir {
        Some(root) => service.delete_all_in(&root),
        None => service.delete_all(),
    })
    .await?;
    cleanup_result(summary)
}

/// Reclaim orphans in the background after startup.
///
/// Skipped when disabled in config or when no roots are tracked, since
/// every entry would count as an orphan.
pub fn spawn_startup_cleanup(service: Arc<ThumbnailService>) -> Option<tokio::task::JoinHandle<()>> {
    if !service.config().cache.cleanup_on_startup {
        return None;
    }
    if service.roots().is_empty() {
        tracing::info!("No library roots tracked; skipping startup cleanup");
        return None;
    }

    Some(tokio::spawn(async move {
        match cleanup_orphan_thumbnails(service, None).await {
            Ok(summary) => tracing::info!("Startup cleanup removed {} thumbnails", summary.removed),
            Err(e) => tracing::warn!("Startup cleanup failed: {}", e),
        }
    }))
}
