//! Media classification by file extension

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Image extensions with a thumbnail decoder
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "avif",
];

/// Video containers. Listed as media, but only produce thumbnails when a
/// frame extractor is configured.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "mkv", "avi", "mov", "wmv", "flv", "m4v",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a lowercase-or-not extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Lowercase extension of a path, if it has a UTF-8 one
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Kind of a path purely from its extension; never touches the filesystem
pub fn classify(path: &Path) -> Option<MediaKind> {
    extension_of(path).and_then(|ext| MediaKind::from_extension(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_images() {
        for name in ["a.jpg", "a.JPEG", "a.png", "a.Gif", "a.webp", "a.bmp", "a.svg", "a.ico", "a.AVIF"] {
            assert_eq!(classify(Path::new(name)), Some(MediaKind::Image), "{}", name);
        }
    }

    #[test]
    fn test_classify_videos() {
        for name in ["a.mp4", "a.WEBM", "a.mkv", "a.avi", "a.mov", "a.wmv", "a.flv", "a.m4v"] {
            assert_eq!(classify(Path::new(name)), Some(MediaKind::Video), "{}", name);
        }
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify(Path::new("notes.txt")), None);
        assert_eq!(classify(Path::new("photo.heic")), None);
        assert_eq!(classify(Path::new("raw.cr2")), None);
        assert_eq!(classify(Path::new("Makefile")), None);
    }
}
