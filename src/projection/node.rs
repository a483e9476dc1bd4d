//! Projection tree node types

use super::render::Depth;
use crate::catalog::{FileRecord, Revision};
use crate::types::{ContentHash, FileId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Case-insensitive comparison key for share names
pub(crate) fn fold_name(name: &str) -> String {
    name.nfc().collect::<String>().to_lowercase()
}

pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a == b || fold_name(a) == fold_name(b)
}

/// A file as exposed inside one directory.
///
/// A shallow copy of the catalog record taken at projection time. The revision's
/// track name may carry a disambiguation suffix that the catalog record does not.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub id: FileId,
    pub display_name: String,
    pub revision: Revision,
    pub size: u64,
    pub hash: ContentHash,
    pub locked: bool,
    pub uploaded_on: DateTime<Utc>,
    pub relative_path: String,
}

impl FileEntry {
    pub fn from_record(record: &FileRecord, extension: &str) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name(extension),
            revision: record.revision.clone(),
            size: record.size,
            hash: record.hash.clone(),
            locked: record.locked,
            uploaded_on: record.uploaded_on,
            relative_path: record.relative_path.clone(),
        }
    }

    /// Entity tag used for conditional requests
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.hash)
    }
}

/// Directory node.
///
/// Owns its child directories (shared structurally between snapshots) and the
/// file entries it exposes. Cloning a directory never clones its render cache.
#[derive(Debug)]
pub struct Directory {
    pub(crate) name: Option<String>,
    pub(crate) children: Vec<Arc<Directory>>,
    pub(crate) files: Vec<FileEntry>,
    cache: Mutex<HashMap<Depth, Arc<str>>>,
}

impl Clone for Directory {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            children: self.children.clone(),
            files: self.files.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl Directory {
    pub fn root() -> Self {
        Self {
            name: None,
            children: Vec::new(),
            files: Vec::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::root()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.name.is_none()
    }

    pub fn children(&self) -> &[Arc<Directory>] {
        &self.children
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// No child directories and no files
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.files.is_empty()
    }

    /// Child directory matching `name`, ignoring case
    pub fn child(&self, name: &str) -> Option<&Arc<Directory>> {
        self.children
            .iter()
            .find(|c| c.name().is_some_and(|n| names_match(n, name)))
    }

    pub(crate) fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|c| c.name().is_some_and(|n| names_match(n, name)))
    }

    /// File entry whose display name matches `name`, ignoring case
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files
            .iter()
            .find(|f| names_match(&f.display_name, name))
    }

    /// Whether this subtree exposes the file anywhere
    pub fn contains_file(&self, id: FileId) -> bool {
        self.files.iter().any(|f| f.id == id) || self.children.iter().any(|c| c.contains_file(id))
    }

    /// Number of placements of `id` in this subtree
    pub fn count_placements(&self, id: FileId) -> usize {
        self.files.iter().filter(|f| f.id == id).count()
            + self
                .children
                .iter()
                .map(|c| c.count_placements(id))
                .sum::<usize>()
    }

    pub(crate) fn cached(&self, depth: Depth) -> Option<Arc<str>> {
        self.cache.lock().get(&depth).cloned()
    }

    pub(crate) fn store_cached(&self, depth: Depth, body: Arc<str>) {
        self.cache.lock().insert(depth, body);
    }

    /// Number of depths with a cached rendering
    pub fn cached_depths(&self) -> usize {
        self.cache.lock().len()
    }

    /// Drop every cached rendering of this node
    pub(crate) fn invalidate(&mut self) {
        self.cache.get_mut().clear();
    }
}

/// Get a mutable node out of a shared handle, copying it if a snapshot still holds
/// it, and drop its cached renderings.
pub(crate) fn touch(node: &mut Arc<Directory>) -> &mut Directory {
    let dir = Arc::make_mut(node);
    dir.invalidate();
    dir
}
