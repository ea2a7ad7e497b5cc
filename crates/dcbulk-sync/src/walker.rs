//! Local tree traversal
//!
//! Walks a directory depth-first in lexicographic name order. Every
//! directory is yielded before anything inside it, which lets the
//! replicator create remote folders in a single pass.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use dcbulk_core::domain::LocalEntry;

use crate::WalkError;

/// Entries and per-entry errors of one complete traversal
#[derive(Debug, Clone, Default)]
pub struct TreeScan {
    pub entries: Vec<LocalEntry>,
    pub errors: Vec<WalkError>,
}

impl TreeScan {
    pub fn directories(&self) -> impl Iterator<Item = &LocalEntry> {
        self.entries.iter().filter(|e| e.is_dir())
    }

    pub fn files(&self) -> impl Iterator<Item = &LocalEntry> {
        self.entries.iter().filter(|e| e.is_file())
    }
}

/// Walks the tree below a root directory
#[derive(Debug, Clone)]
pub struct LocalTreeWalker {
    root: PathBuf,
}

impl LocalTreeWalker {
    /// # Errors
    /// Returns `WalkError::NotADirectory` if `root` is not a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WalkError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WalkError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh traversal
    pub fn iter(&self) -> LocalTreeIter {
        LocalTreeIter {
            root: self.root.clone(),
            inner: WalkDir::new(&self.root)
                .min_depth(1)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
        }
    }

    /// Run a full traversal on the blocking pool
    ///
    /// # Errors
    /// Returns `WalkError::Interrupted` if the traversal task panicked
    pub async fn scan(&self) -> Result<TreeScan, WalkError> {
        let walker = self.clone();
        let scan = tokio::task::spawn_blocking(move || {
            let mut scan = TreeScan::default();
            for item in walker.iter() {
                match item {
                    Ok(entry) => scan.entries.push(entry),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable entry");
                        scan.errors.push(e);
                    }
                }
            }
            scan
        })
        .await
        .map_err(|e| WalkError::Interrupted(e.to_string()))?;

        debug!(
            root = %self.root.display(),
            entries = scan.entries.len(),
            errors = scan.errors.len(),
            "Local tree scanned"
        );
        Ok(scan)
    }
}

impl<'a> IntoIterator for &'a LocalTreeWalker {
    type Item = Result<LocalEntry, WalkError>;
    type IntoIter = LocalTreeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One traversal in progress
pub struct LocalTreeIter {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl LocalTreeIter {
    fn relative_segments(&self, path: &Path) -> Option<Vec<String>> {
        path.strip_prefix(&self.root)
            .ok()?
            .components()
            .map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect()
    }
}

impl Iterator for LocalTreeIter {
    type Item = Result<LocalEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Err(WalkError::Io {
                        path,
                        message: e.to_string(),
                    }));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                warn!(path = %entry.path().display(), "Skipping symbolic link");
                continue;
            }

            let Some(relative) = self.relative_segments(entry.path()) else {
                if file_type.is_dir() {
                    self.inner.skip_current_dir();
                }
                return Some(Err(WalkError::NonUtf8Name(entry.path().to_path_buf())));
            };
            let source = entry.path().to_path_buf();

            if file_type.is_dir() {
                return Some(Ok(LocalEntry::directory(relative, source)));
            }
            if file_type.is_file() {
                return Some(match entry.metadata() {
                    Ok(meta) => Ok(LocalEntry::file(relative, meta.len(), source)),
                    Err(e) => Err(WalkError::Io {
                        path: source,
                        message: e.to_string(),
                    }),
                });
            }

            warn!(path = %entry.path().display(), "Skipping special file");
        }
    }
}
