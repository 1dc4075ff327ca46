//! Application error types

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Per-file errors (reported as a tile status, batch continues) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("Cache write error: {0}")]
    CacheWrite(String),

    #[error("Cache path {artifact} is already owned by {existing}")]
    CacheKeyCollision { artifact: String, existing: String },

    // ===== Subsystem errors (fail the command, never the process) =====
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

impl AppError {
    /// Is this error confined to a single file?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Io(_)
                | AppError::FileNotFound(_)
                | AppError::AccessDenied(_)
                | AppError::InvalidPath(_)
                | AppError::UnsupportedFormat(_)
                | AppError::ImageDecode(_)
                | AppError::ImageEncode(_)
                | AppError::CacheWrite(_)
                | AppError::CacheKeyCollision { .. }
        )
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::FileNotFound(path) => format!("File not found: {}", path),
            AppError::AccessDenied(path) => format!("Access denied: {}", path),
            AppError::UnsupportedFormat(ext) => format!("Unsupported format: {}", ext),
            AppError::ImageDecode(msg) => format!("Cannot load image: {}", msg),
            AppError::CacheWrite(msg) => format!("Cannot save thumbnail: {}", msg),
            _ => self.to_string(),
        }
    }
}

impl From<app_fs::FsError> for AppError {
    fn from(e: app_fs::FsError) -> Self {
        match e {
            app_fs::FsError::Io(e) => AppError::Io(e),
            app_fs::FsError::NotFound(p) => AppError::FileNotFound(p),
            app_fs::FsError::AccessDenied(p) => AppError::AccessDenied(p),
            app_fs::FsError::InvalidPath(p) => AppError::InvalidPath(p),
        }
    }
}

impl From<app_db::DbError> for AppError {
    fn from(e: app_db::DbError) -> Self {
        match e {
            app_db::DbError::Conflict { key, existing } => AppError::CacheKeyCollision {
                artifact: key,
                existing,
            },
            app_db::DbError::Io(e) => AppError::Io(e),
            _ => AppError::Manifest(e.to_string()),
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Encoding(_) => AppError::ImageEncode(e.to_string()),
            image::ImageError::IoError(e) => AppError::Io(e),
            image::ImageError::Unsupported(_) => AppError::UnsupportedFormat(e.to_string()),
            _ => AppError::ImageDecode(e.to_string()),
        }
    }
}

impl From<resvg::usvg::Error> for AppError {
    fn from(e: resvg::usvg::Error) -> Self {
        AppError::ImageDecode(e.to_string())
    }
}
