//! Media Viewer database layer
//!
//! Provides the SQLite manifest that records, for every cached thumbnail
//! artifact, the source file it was generated from.

mod manifest;
mod schema;
mod pool;

pub use manifest::{Manifest, ManifestRecord, MANIFEST_FILE_NAME};
pub use pool::{DbPool, init_pool};
pub use schema::migrate;

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Cache key {key} already belongs to {existing}")]
    Conflict { key: String, existing: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
