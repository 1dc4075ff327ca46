//! Directory listing of media candidates

use crate::{classify, extension_of, FsError, MediaKind, Result, SourcePath};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// A candidate source file for thumbnail generation
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub path: SourcePath,
    pub name: String,
    pub kind: MediaKind,
    pub extension: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl MediaEntry {
    /// Build an entry from a path; `Ok(None)` if it is not a media file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        let Some(kind) = classify(path) else {
            return Ok(None);
        };

        let metadata = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        if metadata.is_dir() {
            return Ok(None);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Some(Self {
            path: SourcePath::new(path),
            name,
            kind,
            extension: extension_of(path).unwrap_or_default(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }))
    }
}

/// List the media files directly inside `dir`, sorted by natural name order.
///
/// Entries that cannot be stat'ed are skipped; only a missing or unreadable
/// `dir` is an error.
pub fn list_media<P: AsRef<Path>>(dir: P) -> Result<Vec<MediaEntry>> {
    let dir = dir.as_ref();

    if !dir.exists() {
        return Err(FsError::NotFound(dir.display().to_string()));
    }

    if !dir.is_dir() {
        return Err(FsError::InvalidPath(format!("Not a directory: {}", dir.display())));
    }

    let mut entries = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| FsError::from_io(e, dir))? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        match MediaEntry::from_path(entry.path()) {
            Ok(Some(media)) => entries.push(media),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("Skipping {}: {}", entry.path().display(), e);
            }
        }
    }

    entries.sort_by(|a, b| natural_cmp(&a.name, &b.name));

    Ok(entries)
}

/// Natural, case-insensitive name ordering with a bytewise tie-break.
/// "image2.jpg" < "image10.jpg"
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a)
        .cmp(&natural_sort_key(b))
        .then_with(|| a.cmp(b))
}

fn natural_sort_key(s: &str) -> Vec<NaturalSortPart> {
    let mut parts = Vec::new();
    let mut current_num = String::new();
    let mut current_str = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            if !current_str.is_empty() {
                parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
                current_str.clear();
            }
            current_num.push(c);
        } else {
            if !current_num.is_empty() {
                parts.push(NaturalSortPart::num(&current_num));
                current_num.clear();
            }
            current_str.push(c);
        }
    }

    if !current_num.is_empty() {
        parts.push(NaturalSortPart::num(&current_num));
    }
    if !current_str.is_empty() {
        parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
    }

    parts
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalSortPart {
    Num(u64),
    Str(String),
}

impl NaturalSortPart {
    fn num(digits: &str) -> Self {
        // Digit runs too long for u64 fall back to text comparison
        digits
            .parse::<u64>()
            .map(NaturalSortPart::Num)
            .unwrap_or_else(|_| NaturalSortPart::Str(digits.to_string()))
    }
}
