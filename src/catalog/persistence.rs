//! Sled-backed catalog persistence
//!
//! Records are stored bincode-encoded under their 16-byte id in the `records` tree.
//! A second tree, `hashes`, maps content hashes to ids for duplicate detection.

use super::{CatalogSource, Deletion, FileRecord};
use crate::error::CatalogError;
use crate::types::FileId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

const RECORDS_TREE: &str = "records";
const HASHES_TREE: &str = "hashes";

/// Persistent catalog on sled
pub struct SledCatalog {
    db: sled::Db,
    records: sled::Tree,
    hashes: sled::Tree,
    /// Serialises read-modify-write updates
    write_lock: Mutex<()>,
}

impl SledCatalog {
    /// Open (or create) a catalog at `path`
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Temporary catalog, removed when dropped
    pub fn temporary() -> Result<Self, CatalogError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, CatalogError> {
        let records = db.open_tree(RECORDS_TREE)?;
        let hashes = db.open_tree(HASHES_TREE)?;
        Ok(Self {
            db,
            records,
            hashes,
            write_lock: Mutex::new(()),
        })
    }

    fn get(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError> {
        match self.records.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: &FileRecord) -> Result<(), CatalogError> {
        let bytes = bincode::serialize(record)?;
        self.records.insert(record.id.as_bytes(), bytes)?;
        self.hashes
            .insert(record.hash.as_bytes(), record.id.as_bytes().as_slice())?;
        Ok(())
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: &FileRecord) -> Result<(), CatalogError> {
        let _guard = self.write_lock.lock();
        self.put(record)?;
        self.db.flush()?;
        debug!(file_id = %record.id, "Stored catalog record");
        Ok(())
    }

    /// Apply `update` to an existing record and store the result
    pub fn modify<F>(&self, id: FileId, update: F) -> Result<FileRecord, CatalogError>
    where
        F: FnOnce(&mut FileRecord),
    {
        let _guard = self.write_lock.lock();
        let mut record = self.get(id)?.ok_or(CatalogError::NotFound(id))?;
        update(&mut record);
        self.put(&record)?;
        self.db.flush()?;
        Ok(record)
    }

    /// Set the deletion marker of a record
    pub fn mark_deleted(&self, id: FileId, deletion: Deletion) -> Result<FileRecord, CatalogError> {
        self.modify(id, |record| record.deleted = Some(deletion))
    }

    /// Look up a record by content hash, deleted or not
    pub fn find_by_hash(&self, hash: &str) -> Result<Option<FileRecord>, CatalogError> {
        let Some(id_bytes) = self.hashes.get(hash.as_bytes())? else {
            return Ok(None);
        };
        let id = FileId::from_slice(&id_bytes)
            .map_err(|e| CatalogError::Unavailable(format!("Corrupt hash index entry: {}", e)))?;
        self.get(id)
    }

    /// Every record, including deleted ones, ordered by id
    pub fn list_all(&self) -> Result<Vec<FileRecord>, CatalogError> {
        let mut out = Vec::new();
        for entry in self.records.iter() {
            let (_, bytes) = entry?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl CatalogSource for SledCatalog {
    async fn list_active_ids(&self) -> Result<Vec<FileId>, CatalogError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| !r.is_deleted())
            .map(|r| r.id)
            .collect())
    }

    async fn get_record(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError> {
        self.get(id)
    }

    async fn record_download(&self, id: FileId) -> Result<(), CatalogError> {
        self.modify(id, |record| record.downloads += 1).map(|_| ())
    }
}
