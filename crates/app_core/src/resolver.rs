//! Cache path resolution: source path -> artifact location

use app_fs::{extension_of, SourcePath};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_128;

/// Hex digits in an artifact key
const KEY_LEN: usize = 32;

/// Encoding of a generated thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    Jpeg,
    Png,
}

impl ArtifactFormat {
    /// Sources that may carry transparency keep it as PNG
    pub fn for_source(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("png" | "gif" | "webp" | "ico" | "svg" | "avif") => ArtifactFormat::Png,
            _ => ArtifactFormat::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Png => "png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ArtifactFormat::Jpeg => ImageFormat::Jpeg,
            ArtifactFormat::Png => ImageFormat::Png,
        }
    }
}

/// Where the artifact for one source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub source: SourcePath,
    /// Path relative to the cache root, '/'-separated: `<size>/<hh>/<key>.<ext>`
    pub relative: String,
    /// Absolute artifact path
    pub path: PathBuf,
    pub format: ArtifactFormat,
}

/// Deterministic mapping from source paths to artifact paths.
///
/// The key is the XXH3-128 of the `/`-normalized source path, so the mapping
/// is stable across runs and platforms. Moving a source file changes its key;
/// the old artifact is left for the reclaimer.
#[derive(Debug, Clone)]
pub struct CachePathResolver {
    root: PathBuf,
    size: u32,
}

impl CachePathResolver {
    pub fn new(root: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            root: root.into(),
            size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Resolve the artifact location for a source file
    pub fn resolve(&self, source: &SourcePath) -> CacheLocation {
        let key = key_for(source.normalized());
        let format = ArtifactFormat::for_source(source.as_path());
        let relative = format!("{}/{}/{}.{}", self.size, &key[..2], key, format.extension());
        let path = self.root.join(&relative);

        CacheLocation {
            source: source.clone(),
            relative,
            path,
            format,
        }
    }
}

/// 32 lowercase hex digits identifying a normalized source path
pub fn key_for(normalized_source: &str) -> String {
    format!("{:032x}", xxh3_128(normalized_source.as_bytes()))
}

/// True for relative paths shaped like `<digits>/<hh>/<32 hex>.<jpg|png>`.
///
/// Anything else under a cache root (manifest, temp files, foreign files) is
/// never treated as an artifact.
pub fn is_artifact_relative(relative: &str) -> bool {
    let parts: Vec<&str> = relative.split('/').collect();
    let [size, fan, file] = parts.as_slice() else {
        return false;
    };

    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

    let Some((key, ext)) = file.rsplit_once('.') else {
        return false;
    };

    !size.is_empty()
        && size.bytes().all(|b| b.is_ascii_digit())
        && fan.len() == 2
        && key.len() == KEY_LEN
        && is_hex(key)
        && key.starts_with(*fan)
        && matches!(ext, "jpg" | "png")
}
