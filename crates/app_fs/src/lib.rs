//! Media Viewer file system layer
//!
//! The host-filesystem collaborator of the thumbnail engine:
//! - SourcePath: absolute, `/`-normalized source file paths
//! - Media classification by extension (image / video tables)
//! - Directory listing of media candidates

mod source_path;
mod media;
mod browser;

pub use source_path::{SourcePath, normalize_separators, is_within};
pub use media::{MediaKind, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS, extension_of, classify};
pub use browser::{MediaEntry, list_media, natural_cmp};

use std::path::Path;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl FsError {
    /// Attach the offending path to an io error where the kind allows it
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                FsError::AccessDenied(path.display().to_string())
            }
            _ => FsError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
