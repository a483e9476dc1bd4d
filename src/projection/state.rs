//! Projection State
//!
//! The process-wide root of the share tree, the two pending-work queues and the
//! readiness gate. Producers (anything that mutates the catalog) enqueue ids; the
//! tree builder is the only writer of the tree; request handlers only read snapshots.

use super::node::Directory;
use crate::types::FileId;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct PendingQueues {
    reindex: BTreeSet<FileId>,
    remove: BTreeSet<FileId>,
}

/// Work drained from the pending queues for one pass
#[derive(Debug, Default)]
pub(crate) struct DrainedWork {
    pub(crate) reindex: BTreeSet<FileId>,
    pub(crate) remove: BTreeSet<FileId>,
}

/// Shared projection state
pub struct ProjectionState {
    root: ArcSwap<Directory>,
    pending: Mutex<PendingQueues>,
    ready: AtomicBool,
}

impl Default for ProjectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionState {
    pub fn new() -> Self {
        Self {
            root: ArcSwap::from_pointee(Directory::root()),
            pending: Mutex::new(PendingQueues::default()),
            ready: AtomicBool::new(false),
        }
    }

    /// Queue a file whose catalog state changed for recomputation
    pub fn enqueue_reindex(&self, id: FileId) {
        let inserted = self.pending.lock().reindex.insert(id);
        if inserted {
            debug!(file_id = %id, "Queued file for reindex");
        }
    }

    /// Queue a file known to be deleted for removal from the tree
    pub fn enqueue_remove(&self, id: FileId) {
        let inserted = self.pending.lock().remove.insert(id);
        if inserted {
            debug!(file_id = %id, "Queued file for removal");
        }
    }

    pub(crate) fn enqueue_reindex_all<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = FileId>,
    {
        let mut pending = self.pending.lock();
        let before = pending.reindex.len();
        pending.reindex.extend(ids);
        pending.reindex.len() - before
    }

    /// False until the first full bootstrap pass has completed
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Current tree. The snapshot never changes underneath the caller.
    pub fn snapshot_root(&self) -> Arc<Directory> {
        self.root.load_full()
    }

    pub(crate) fn publish(&self, root: Arc<Directory>) {
        self.root.store(root);
    }

    /// Pending (reindex, remove) counts
    pub fn pending_counts(&self) -> (usize, usize) {
        let pending = self.pending.lock();
        (pending.reindex.len(), pending.remove.len())
    }

    pub fn has_pending(&self) -> bool {
        let pending = self.pending.lock();
        !pending.reindex.is_empty() || !pending.remove.is_empty()
    }

    /// Take both queues, leaving them empty
    pub(crate) fn drain(&self) -> DrainedWork {
        let mut pending = self.pending.lock();
        DrainedWork {
            reindex: std::mem::take(&mut pending.reindex),
            remove: std::mem::take(&mut pending.remove),
        }
    }
}
