//! SourcePath - absolute, separator-normalized paths used as cache identity

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// An absolute source path plus its `/`-separated textual form.
///
/// The normalized string is the identity of a source file everywhere in the
/// cache: it is what gets hashed, recorded in the manifest and compared
/// against tracked roots. `C:\photos\a.jpg` and `C:/photos/a.jpg` are the
/// same source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourcePath {
    /// Path for file system operations
    raw: PathBuf,

    /// `/`-separated display and identity string
    normalized: String,
}

impl SourcePath {
    /// Create a new SourcePath from any path-like type.
    ///
    /// Relative paths are resolved against the current directory and `.`/`..`
    /// components are folded lexically. Symlinks are not resolved.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let raw = Self::absolutize(path.as_ref());
        let normalized = normalize_separators(&raw.to_string_lossy());
        Self { raw, normalized }
    }

    /// Path for file system operations
    pub fn as_path(&self) -> &Path {
        &self.raw
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.raw.clone()
    }

    /// `/`-normalized form
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn file_name(&self) -> Option<&str> {
        self.raw.file_name()?.to_str()
    }

    pub fn exists(&self) -> bool {
        self.raw.exists()
    }

    /// True if this path is `dir` itself or lies below it
    pub fn is_within(&self, dir: &str) -> bool {
        is_within(&self.normalized, &normalize_separators(dir))
    }

    fn absolutize(path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        };

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                _ => normalized.push(component),
            }
        }
        normalized
    }
}

/// Convert every `\` separator to `/`
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Component-boundary prefix test on normalized paths.
///
/// `/photos` contains `/photos` and `/photos/a.jpg` but not `/photos2/a.jpg`.
pub fn is_within(path: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        // filesystem root
        return path.starts_with('/');
    }
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl AsRef<Path> for SourcePath {
    fn as_ref(&self) -> &Path {
        &self.raw
    }
}

impl From<PathBuf> for SourcePath {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for SourcePath {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<String> for SourcePath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&str> for SourcePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<SourcePath> for String {
    fn from(path: SourcePath) -> Self {
        path.normalized
    }
}

impl std::fmt::Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("/foo/bar/image.jpg"), "/foo/bar/image.jpg");
        assert_eq!(normalize_separators("C:\\foo\\bar\\image.jpg"), "C:/foo/bar/image.jpg");
        assert_eq!(normalize_separators("C:\\foo\\bar/image.jpg"), "C:/foo/bar/image.jpg");
    }

    #[test]
    fn test_folds_dot_components() {
        let path = SourcePath::new("/photos/./2024/../2025/a.jpg");
        assert_eq!(path.normalized(), "/photos/2025/a.jpg");
    }

    #[test]
    fn test_relative_becomes_absolute() {
        let path = SourcePath::new("some/relative.jpg");
        assert!(path.as_path().is_absolute());
        assert!(path.normalized().ends_with("some/relative.jpg"));
    }

    #[test]
    fn test_is_within_respects_component_boundary() {
        assert!(is_within("/photos/a.jpg", "/photos"));
        assert!(is_within("/photos/a.jpg", "/photos/"));
        assert!(is_within("/photos", "/photos"));
        assert!(is_within("/photos/deep/b.png", "/photos"));
        assert!(!is_within("/photos2/a.jpg", "/photos"));
        assert!(!is_within("/other/a.jpg", "/photos"));
        assert!(is_within("/anything.jpg", "/"));
    }

    #[test]
    fn test_into_string_is_normalized_form() {
        let path = SourcePath::new("/photos/a.jpg");
        assert_eq!(String::from(path.clone()), "/photos/a.jpg");
        assert_eq!(SourcePath::from(String::from(path.clone())), path);
    }
}
