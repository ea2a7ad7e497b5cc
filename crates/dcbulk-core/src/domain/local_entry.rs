//! Local filesystem entries produced by a tree walk

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Whether a local entry is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single local file or directory below the walk root
///
/// `relative_path` never includes the walk root itself, so an entry directly
/// below the root has exactly one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEntry {
    relative_path: Vec<String>,
    kind: EntryKind,
    size: u64,
    source: PathBuf,
}

impl LocalEntry {
    #[must_use]
    pub fn new(relative_path: Vec<String>, kind: EntryKind, size: u64, source: PathBuf) -> Self {
        Self {
            relative_path,
            kind,
            size,
            source,
        }
    }

    /// Convenience constructor for a file entry
    #[must_use]
    pub fn file(relative_path: Vec<String>, size: u64, source: PathBuf) -> Self {
        Self::new(relative_path, EntryKind::File, size, source)
    }

    /// Convenience constructor for a directory entry
    #[must_use]
    pub fn directory(relative_path: Vec<String>, source: PathBuf) -> Self {
        Self::new(relative_path, EntryKind::Directory, 0, source)
    }

    #[must_use]
    pub fn relative_path(&self) -> &[String] {
        &self.relative_path
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Size in bytes (0 for directories)
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Absolute location on the local filesystem
    #[must_use]
    pub fn source(&self) -> &PathBuf {
        &self.source
    }

    /// Final segment of the relative path
    #[must_use]
    pub fn name(&self) -> &str {
        self.relative_path.last().map(String::as_str).unwrap_or("")
    }

    /// Relative path of the containing directory (empty for top-level entries)
    #[must_use]
    pub fn parent_relative(&self) -> &[String] {
        match self.relative_path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// Number of segments in the relative path
    #[must_use]
    pub fn depth(&self) -> usize {
        self.relative_path.len()
    }

    /// Returns true if this entry lies strictly below `ancestor`
    #[must_use]
    pub fn is_below(&self, ancestor: &[String]) -> bool {
        self.relative_path.len() > ancestor.len() && self.relative_path.starts_with(ancestor)
    }

    /// Slash-joined relative path, for logs and reports
    #[must_use]
    pub fn display_path(&self) -> String {
        self.relative_path.join("/")
    }
}
