//! Builder behavior when the catalog misbehaves

use super::support::record;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use yeek::catalog::{CatalogSource, FileRecord, MemoryCatalog, Revision};
use yeek::error::{ApiError, CatalogError};
use yeek::projection::{BuilderOptions, ProjectionState, TreeBuilder};
use yeek::types::FileId;

/// Catalog that fails or stalls on chosen ids
#[derive(Default)]
struct FlakyCatalog {
    inner: MemoryCatalog,
    failing: Mutex<HashSet<FileId>>,
    slow: Mutex<HashSet<FileId>>,
    listing_down: AtomicBool,
}

#[async_trait]
impl CatalogSource for FlakyCatalog {
    async fn list_active_ids(&self) -> Result<Vec<FileId>, CatalogError> {
        if self.listing_down.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("listing offline".to_string()));
        }
        self.inner.list_active_ids().await
    }

    async fn get_record(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError> {
        if self.failing.lock().contains(&id) {
            return Err(CatalogError::Unavailable("connection reset".to_string()));
        }
        let slow = self.slow.lock().contains(&id);
        if slow {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.get_record(id).await
    }
}

fn builder(catalog: &Arc<FlakyCatalog>, fetch_timeout: Duration) -> TreeBuilder {
    let options = BuilderOptions {
        fetch_timeout,
        ..BuilderOptions::default()
    };
    TreeBuilder::new(Arc::new(ProjectionState::new()), catalog.clone(), options)
}

#[tokio::test]
async fn test_failed_fetch_is_requeued() {
    let good = record(1, Revision::new("Good"));
    let bad = record(2, Revision::new("Bad"));
    let catalog = Arc::new(FlakyCatalog::default());
    catalog.inner.upsert(good.clone());
    catalog.inner.upsert(bad.clone());
    catalog.failing.lock().insert(bad.id);

    let mut builder = builder(&catalog, Duration::from_secs(2));
    let report = builder.run_pass().await.unwrap();

    assert_eq!(report.reindexed, 1);
    assert_eq!(report.failed, 1);
    assert!(builder.state().is_ready());
    assert_eq!(builder.state().pending_counts(), (1, 0));
    let root = builder.state().snapshot_root();
    assert_eq!(root.count_placements(good.id), 2);
    assert_eq!(root.count_placements(bad.id), 0);

    catalog.failing.lock().clear();
    let report = builder.run_pass().await.unwrap();
    assert_eq!(report.reindexed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(builder.state().snapshot_root().count_placements(bad.id), 2);
}

#[tokio::test]
async fn test_fetch_timeout_skips_file() {
    let quick = record(1, Revision::new("Quick"));
    let stuck = record(2, Revision::new("Stuck"));
    let catalog = Arc::new(FlakyCatalog::default());
    catalog.inner.upsert(quick.clone());
    catalog.inner.upsert(stuck.clone());
    catalog.slow.lock().insert(stuck.id);

    let mut builder = builder(&catalog, Duration::from_millis(50));
    let report = builder.run_pass().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(builder.state().is_ready());
    let root = builder.state().snapshot_root();
    assert_eq!(root.count_placements(quick.id), 2);
    assert_eq!(root.count_placements(stuck.id), 0);
    assert_eq!(builder.state().pending_counts(), (1, 0));
}

#[tokio::test]
async fn test_listing_failure_keeps_share_unready() {
    let song = record(1, Revision::new("Song"));
    let catalog = Arc::new(FlakyCatalog::default());
    catalog.inner.upsert(song.clone());
    catalog.listing_down.store(true, Ordering::SeqCst);

    let mut builder = builder(&catalog, Duration::from_secs(2));
    let queued = FileId::from_u128(99);
    builder.state().enqueue_reindex(queued);

    let err = builder.run_pass().await.unwrap_err();
    assert!(matches!(err, ApiError::Catalog(CatalogError::Unavailable(_))));
    assert!(!builder.state().is_ready());
    assert_eq!(builder.state().pending_counts(), (1, 0));
    assert!(builder.has_work());

    catalog.listing_down.store(false, Ordering::SeqCst);
    let report = builder.run_pass().await.unwrap();
    assert!(report.bootstrapped);
    assert!(builder.state().is_ready());
    assert_eq!(builder.state().snapshot_root().count_placements(song.id), 2);
}
