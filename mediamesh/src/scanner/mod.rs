//! Local media scanner.
//!
//! Produces the host owner's catalog by walking the media root. The walk is a
//! plain recursive traversal: files are kept when their extension is on the
//! allow-list, directories are skipped when their name is on the ignore-list
//! or hidden.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::CatalogEntry;

/// Extensions scanned when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm", "mp3", "flac", "m4a", "srt",
];

/// Folder names skipped when none are configured.
pub const DEFAULT_IGNORED: &[&str] = &["@eaDir", "#recycle", "$RECYCLE.BIN", "lost+found", "Sample"];

/// Errors raised while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The media root does not exist or is not a directory.
    #[error("media root {} is not a readable directory", .0.display())]
    MissingRoot(PathBuf),

    /// The walk failed on an entry it could not skip.
    #[error("scan failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Source of the host owner's current file list.
pub trait LocalScanner: Send + Sync {
    /// Scan the local media and return the full catalog for `owner`.
    fn scan(&self, owner: &str) -> Result<Vec<CatalogEntry>, ScanError>;
}

/// Scanner walking a directory tree with `walkdir`.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
    extensions: Vec<String>,
    ignored: Vec<String>,
}

impl DirectoryScanner {
    /// Create a scanner for `root` with the default allow and ignore lists.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignored: DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the extension allow-list. Matching is case-insensitive.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Replace the folder ignore-list.
    pub fn with_ignored<I, S>(mut self, ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored = ignored.into_iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.ignored.iter().any(|i| i.as_str() == name)
    }

    fn is_allowed_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }

    fn to_entry(&self, owner: &str, entry: &DirEntry) -> Option<CatalogEntry> {
        let relative = entry.path().strip_prefix(&self.root).ok()?;
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let filename = components.last()?.clone();
        let library = if components.len() > 1 {
            components[0].clone()
        } else {
            String::new()
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                return None;
            }
        };
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let quality = detect_quality(&filename);
        Some(
            CatalogEntry::new(owner, components.join("/"), filename, metadata.len())
                .with_library(library)
                .with_quality(quality)
                .with_last_modified(last_modified),
        )
    }
}

impl LocalScanner for DirectoryScanner {
    fn scan(&self, owner: &str) -> Result<Vec<CatalogEntry>, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::MissingRoot(self.root.clone()));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !self.is_ignored_dir(e));

        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(e) if e.depth() > 0 => {
                    warn!(error = %e, "Skipping unreadable path");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !item.file_type().is_file() || !self.is_allowed_file(item.path()) {
                continue;
            }
            if let Some(entry) = self.to_entry(owner, &item) {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(root = %self.root.display(), files = entries.len(), "Media root scanned");
        Ok(entries)
    }
}

/// Resolution tag from a filename: `2160p`, `1080p`, `720p`, `480p` or `SD`.
pub fn detect_quality(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.contains("2160p") || lower.contains("4k") || lower.contains("uhd") {
        "2160p"
    } else if lower.contains("1080p") || lower.contains("1080i") {
        "1080p"
    } else if lower.contains("720p") {
        "720p"
    } else if lower.contains("480p") {
        "480p"
    } else {
        "SD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, len: usize) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_scan_collects_allowed_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "Movies/Heat.1995.1080p.mkv", 10);
        touch(temp_dir.path(), "Movies/notes.txt", 5);
        touch(temp_dir.path(), "clip.MP4", 3);

        let entries = DirectoryScanner::new(temp_dir.path()).scan("Josh").unwrap();

        assert_eq!(entries.len(), 2);
        let heat = entries.iter().find(|e| e.library == "Movies").unwrap();
        assert_eq!(heat.path, "Movies/Heat.1995.1080p.mkv");
        assert_eq!(heat.filename, "Heat.1995.1080p.mkv");
        assert_eq!(heat.quality, "1080p");
        assert_eq!(heat.size_bytes, 10);
        assert_eq!(heat.id, "JoshMovies/Heat.1995.1080p.mkv");

        let clip = entries.iter().find(|e| e.filename == "clip.MP4").unwrap();
        assert_eq!(clip.library, "");
    }

    #[test]
    fn test_scan_skips_ignored_and_hidden_folders() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "Shows/@eaDir/thumb.mkv", 1);
        touch(temp_dir.path(), "Shows/.trash/old.mkv", 1);
        touch(temp_dir.path(), "Shows/Skip/ep1.mkv", 1);
        touch(temp_dir.path(), "Shows/Keep/ep1.mkv", 1);

        let entries = DirectoryScanner::new(temp_dir.path())
            .with_ignored(["@eaDir", "Skip"])
            .scan("Josh")
            .unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Shows/Keep/ep1.mkv"]);
    }

    #[test]
    fn test_custom_extensions() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.iso", 1);
        touch(temp_dir.path(), "b.mkv", 1);

        let entries = DirectoryScanner::new(temp_dir.path())
            .with_extensions([".ISO"])
            .scan("Josh")
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "a.iso");
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(temp_dir.path().join("absent"));

        assert!(matches!(scanner.scan("Josh"), Err(ScanError::MissingRoot(_))));
    }

    #[test]
    fn test_detect_quality() {
        assert_eq!(detect_quality("Film.2160p.HDR.mkv"), "2160p");
        assert_eq!(detect_quality("film.4K.mkv"), "2160p");
        assert_eq!(detect_quality("Show.S01E01.720p.mkv"), "720p");
        assert_eq!(detect_quality("old.avi"), "SD");
    }
}
