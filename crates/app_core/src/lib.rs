//! Media Viewer thumbnail engine
//!
//! This crate contains:
//! - Configuration and error types
//! - Cache path resolution and the artifact store
//! - Thumbnail generation
//! - Browsing sessions and the update event channel
//! - The generation scheduler and orphan reclamation
//! - The service object and the command surface built on it

pub mod board;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod reclaimer;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod store;

pub use board::{ThumbnailBoard, Tile};
pub use commands::{
    cleanup_orphan_thumbnails, cleanup_thumbnails_for_dir, delete_all_thumbnails,
    generate_thumbnails, spawn_startup_cleanup, CommandError, CommandResult,
};
pub use config::{default_cache_root, AppConfig, CacheConfig, LibraryConfig, WorkerConfig};
pub use error::AppError;
pub use events::{
    event_channel, EventPublisher, EventReceiver, ThumbnailStatus, ThumbnailUpdate,
    THUMBNAIL_UPDATE_EVENT,
};
pub use generator::{FrameExtractor, GenerateOutcome, ThumbnailGenerator};
pub use reclaimer::{cleanup_for_directory, cleanup_orphans, delete_all, CleanupSummary};
pub use resolver::{ArtifactFormat, CacheLocation, CachePathResolver};
pub use scheduler::{BatchSummary, Scheduler};
pub use service::ThumbnailService;
pub use session::{CancellationToken, SessionId, SessionManager};
pub use store::{CacheStore, DiskCacheStore, MemoryCacheStore, StoredEntry};
