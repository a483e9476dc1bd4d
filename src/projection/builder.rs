//! Tree Builder
//!
//! Applies pending catalog changes to the share tree, one pass at a time. A pass
//! drains both queues, removes deleted files, (re)places each queued file under
//! all of its classification paths, and finally re-places every file whose name
//! had been disambiguated. The new tree is published in one swap at the end of
//! the pass; readers keep using the previous snapshot until then.

use super::classify::{classify, ClassPath};
use super::node::{touch, Directory, FileEntry};
use super::state::ProjectionState;
use crate::catalog::{CatalogSource, FileRecord};
use crate::error::ApiError;
use crate::types::FileId;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tree builder settings
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Upper bound on a single catalog fetch
    pub fetch_timeout: Duration,
    /// Extension appended to display names
    pub file_extension: String,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(2000),
            file_extension: "midi".to_string(),
        }
    }
}

/// Summary of one builder pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Whether this pass enumerated the whole catalog
    pub bootstrapped: bool,
    /// Ids purged through the removal queue or found deleted on fetch
    pub removed: usize,
    /// Ids placed into the tree
    pub reindexed: usize,
    /// Ids re-processed because their name had been disambiguated
    pub reflowed: usize,
    /// Ids whose fetch failed; they are queued again for the next pass
    pub failed: usize,
    pub duration_ms: u64,
}

/// Incremental maintainer of the share tree. Sole writer of the published root.
pub struct TreeBuilder {
    state: Arc<ProjectionState>,
    catalog: Arc<dyn CatalogSource>,
    options: BuilderOptions,
    /// Ids placed with a " (n)" suffix in at least one directory
    reflow: HashSet<FileId>,
}

impl TreeBuilder {
    pub fn new(
        state: Arc<ProjectionState>,
        catalog: Arc<dyn CatalogSource>,
        options: BuilderOptions,
    ) -> Self {
        Self {
            state,
            catalog,
            options,
            reflow: HashSet::new(),
        }
    }

    pub fn state(&self) -> &Arc<ProjectionState> {
        &self.state
    }

    /// Whether a pass would have anything to do.
    ///
    /// Disambiguated files alone are not work: their names can only change after
    /// some other file moves, and that move is queued.
    pub fn has_work(&self) -> bool {
        !self.state.is_ready() || self.state.has_pending()
    }

    /// Ids currently carrying a disambiguation suffix somewhere
    pub fn disambiguated(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.reflow.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Run one pass.
    ///
    /// Only a failure to enumerate the catalog during bootstrap is returned; the
    /// queues are untouched in that case. Per-file fetch failures are logged and
    /// the file is queued again.
    pub async fn run_pass(&mut self) -> Result<PassReport, ApiError> {
        let start = Instant::now();
        let mut report = PassReport::default();

        if !self.state.is_ready() {
            info!("Performing first time projection build, this may take a while");
            let ids = self.catalog.list_active_ids().await?;
            let queued = self.state.enqueue_reindex_all(ids);
            debug!(queued, "Queued catalog for bootstrap");
            report.bootstrapped = true;
        }

        let work = self.state.drain();
        let mut root = self.state.snapshot_root();

        for id in &work.remove {
            debug!(file_id = %id, "Removing file from projection");
            if remove_everywhere(&mut root, *id) {
                report.removed += 1;
            }
            self.reflow.remove(id);
        }

        let mut failed = BTreeSet::new();
        for id in work.reindex {
            self.update(&mut root, id, &mut report, &mut failed).await;
        }

        // Suffixed files go last so every sibling has already moved. Re-placing a
        // suffixed file can only free names, so repeat while the set shrinks.
        let mut round: BTreeSet<FileId> = self.reflow.iter().copied().collect();
        report.reflowed = round.len();
        while !round.is_empty() {
            for id in &round {
                if !failed.contains(id) {
                    self.update(&mut root, *id, &mut report, &mut failed).await;
                }
            }
            let remaining: BTreeSet<FileId> = self
                .reflow
                .iter()
                .copied()
                .filter(|id| !failed.contains(id))
                .collect();
            if remaining.len() >= round.len() {
                break;
            }
            round = remaining;
        }

        self.state.publish(root);
        report.failed = failed.len();
        for id in failed {
            self.state.enqueue_reindex(id);
        }

        if report.bootstrapped {
            self.state.mark_ready();
        }
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Fetch `id` and re-place it, or drop it when it is gone from the catalog
    async fn update(
        &mut self,
        root: &mut Arc<Directory>,
        id: FileId,
        report: &mut PassReport,
        failed: &mut BTreeSet<FileId>,
    ) {
        match self.fetch(id).await {
            Ok(Some(record)) if !record.is_deleted() => {
                self.place(root, &record);
                report.reindexed += 1;
            }
            Ok(_) => {
                debug!(file_id = %id, "File vanished or is deleted, removing");
                if remove_everywhere(root, id) {
                    report.removed += 1;
                }
                self.reflow.remove(&id);
            }
            Err(e) => {
                warn!(file_id = %id, error = %e, "Failed to fetch file, skipping");
                failed.insert(id);
            }
        }
    }

    async fn fetch(&self, id: FileId) -> Result<Option<FileRecord>, ApiError> {
        match tokio::time::timeout(self.options.fetch_timeout, self.catalog.get_record(id)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ApiError::FetchTimeout(id)),
        }
    }

    /// Replace every placement of `record` with fresh ones under its current paths
    fn place(&mut self, root: &mut Arc<Directory>, record: &FileRecord) {
        remove_everywhere(root, record.id);

        let mut disambiguated = false;
        for path in classify(&record.revision) {
            let dir = ensure_path(root, &path);
            if insert_entry(dir, record, &self.options.file_extension) {
                debug!(file_id = %record.id, path = %path, "Disambiguated display name");
                disambiguated = true;
            }
        }

        if disambiguated {
            self.reflow.insert(record.id);
        } else {
            self.reflow.remove(&record.id);
        }
    }
}

/// Walk `path` from `root`, creating missing directories. Every directory on the
/// way is copied if shared and has its cache dropped.
fn ensure_path<'a>(root: &'a mut Arc<Directory>, path: &ClassPath) -> &'a mut Directory {
    let mut dir = touch(root);
    for segment in path.segments() {
        let index = match dir.child_index(segment) {
            Some(index) => index,
            None => {
                dir.children.push(Arc::new(Directory::new(segment.clone())));
                dir.children.len() - 1
            }
        };
        dir = touch(&mut dir.children[index]);
    }
    dir
}

/// Add a copy of `record` to `dir`, suffixing the track name with the smallest
/// " (n)" that makes the display name unique in `dir`. Returns whether a suffix
/// was needed.
fn insert_entry(dir: &mut Directory, record: &FileRecord, extension: &str) -> bool {
    if dir.files.iter().any(|f| f.id == record.id) {
        return false;
    }

    let mut entry = FileEntry::from_record(record, extension);
    let mut counter = 0;
    while dir.file(&entry.display_name).is_some() {
        counter += 1;
        entry.revision.track_name = format!("{} ({})", record.revision.track_name.trim(), counter);
        entry.display_name = entry.revision.display_name(extension);
    }

    dir.files.push(entry);
    counter > 0
}

/// Delete every entry of `id` below `dir` and prune directories left empty.
/// Subtrees without the file are not copied, so their caches survive.
fn remove_everywhere(dir: &mut Arc<Directory>, id: FileId) -> bool {
    if !dir.contains_file(id) {
        return false;
    }

    let node = touch(dir);
    node.files.retain(|f| f.id != id);
    for child in node.children.iter_mut() {
        remove_everywhere(child, id);
    }
    node.children.retain(|c| !c.is_empty());
    true
}
