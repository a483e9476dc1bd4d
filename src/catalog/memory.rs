//! In-process catalog, used for embedding and tests.

use super::{CatalogSource, Deletion, FileRecord};
use crate::error::CatalogError;
use crate::types::FileId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Catalog held entirely in memory
#[derive(Default)]
pub struct MemoryCatalog {
    records: RwLock<HashMap<FileId, FileRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: FileRecord) {
        self.records.write().insert(record.id, record);
    }

    /// Set the deletion marker of a record. Returns false if the id is unknown.
    pub fn mark_deleted(&self, id: FileId, deletion: Deletion) -> bool {
        match self.records.write().get_mut(&id) {
            Some(record) => {
                record.deleted = Some(deletion);
                true
            }
            None => false,
        }
    }

    /// Drop a record entirely, as if it never existed
    pub fn forget(&self, id: FileId) -> Option<FileRecord> {
        self.records.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn list_active_ids(&self) -> Result<Vec<FileId>, CatalogError> {
        let mut ids: Vec<FileId> = self
            .records
            .read()
            .values()
            .filter(|r| !r.is_deleted())
            .map(|r| r.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_record(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn record_download(&self, id: FileId) -> Result<(), CatalogError> {
        match self.records.write().get_mut(&id) {
            Some(record) => {
                record.downloads += 1;
                Ok(())
            }
            None => Err(CatalogError::NotFound(id)),
        }
    }
}
