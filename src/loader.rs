//! Loader — walks a repository root and yields decoded file records in
//! deterministic order, honoring ignore rules.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tokio_util::sync::CancellationToken;

use crate::error::{LoaderError, LoaderResult};
use crate::types::Language;

/// Default maximum size of a file the loader will read, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Extensions the loader skips outright regardless of `.gitignore` contents:
/// lock files and common binary artifacts.
const DEFAULT_BLOCKLIST_EXTENSIONS: &[&str] = &[
    "lock", "png", "jpg", "jpeg", "gif", "ico", "woff", "woff2", "ttf", "eot", "pdf", "zip",
    "tar", "gz", "so", "dylib", "dll", "exe", "wasm", "class", "jar", "o", "a",
];

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub relative_path: String,
    pub language: Language,
    pub bytes: String,
}

pub struct Loader {
    max_file_size: u64,
}

impl Default for Loader {
    fn default() -> Self {
        Self { max_file_size: DEFAULT_MAX_FILE_SIZE }
    }
}

impl Loader {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Walks `root` and returns file records sorted by relative path, the
    /// ordering the Engine relies on for reproducible downstream indexing.
    /// Checks `cancel` between files and stops early with
    /// `LoaderError::Cancelled` once it fires.
    pub fn load(&self, root: &Path, cancel: &CancellationToken) -> LoaderResult<Vec<FileRecord>> {
        if !root.is_dir() {
            return Err(LoaderError::PathError { path: root.to_path_buf() });
        }

        let mut records = Vec::new();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build();

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(LoaderError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                // Individual unreadable entries are skipped, not fatal.
                Err(_) => continue,
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if self.is_blocklisted(path) {
                continue;
            }
            match self.read_file(root, path) {
                Some(record) => records.push(record),
                None => continue,
            }
        }

        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(records)
    }

    fn is_blocklisted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DEFAULT_BLOCKLIST_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    fn read_file(&self, root: &Path, path: &Path) -> Option<FileRecord> {
        let metadata = std::fs::metadata(path).ok()?;
        if metadata.len() > self.max_file_size {
            tracing::info!(path = %path.display(), size = metadata.len(), "skipping oversized file");
            return None;
        }

        let bytes = std::fs::read(path).ok()?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                tracing::debug!(path = %path.display(), "skipping non-UTF-8 file");
                return None;
            }
        };

        let relative_path = relative_posix_path(root, path);
        let language = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);

        Some(FileRecord { relative_path, language, bytes: text })
    }
}

fn relative_posix_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn skips_nonexistent_root() {
        let loader = Loader::default();
        let err = loader.load(Path::new("/does/not/exist"), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, LoaderError::PathError { .. }));
    }

    #[test]
    fn loads_files_in_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.go"), "package main").unwrap();
        fs::write(dir.path().join("a.go"), "package main").unwrap();

        let loader = Loader::default();
        let records = loader.load(dir.path(), &CancellationToken::new()).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.go", "b.go"]);
    }

    #[test]
    fn skips_oversized_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.go"), "x".repeat(100)).unwrap();

        let loader = Loader::new(10);
        let records = loader.load(dir.path(), &CancellationToken::new()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn honors_gitignore() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.go\n").unwrap();
        fs::write(dir.path().join("ignored.go"), "package main").unwrap();
        fs::write(dir.path().join("kept.go"), "package main").unwrap();

        let loader = Loader::default();
        let records = loader.load(dir.path(), &CancellationToken::new()).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["kept.go"]);
    }

    #[test]
    fn stops_early_once_cancelled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.go"), "package main").unwrap();

        let loader = Loader::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = loader.load(dir.path(), &cancel).unwrap_err();
        assert!(matches!(err, LoaderError::Cancelled));
    }
}
