//! Catalog Service
//!
//! The mutating side of the catalog. Every operation that changes what the share
//! should show notifies the projection state before returning; the builder picks
//! the change up on its next pass.

use crate::catalog::{segment_name, CatalogSource, Deletion, FileRecord, Revision, SledCatalog};
use crate::content::{content_hash, ContentStore};
use crate::error::{ApiError, CatalogError};
use crate::projection::ProjectionState;
use crate::types::FileId;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Catalog mutations with projection notification
pub struct CatalogService {
    catalog: Arc<SledCatalog>,
    content: Arc<dyn ContentStore>,
    state: Arc<ProjectionState>,
    max_upload_bytes: u64,
    extension: String,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<SledCatalog>,
        content: Arc<dyn ContentStore>,
        state: Arc<ProjectionState>,
        max_upload_bytes: u64,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            content,
            state,
            max_upload_bytes,
            extension: extension.into(),
        }
    }

    pub fn catalog(&self) -> &Arc<SledCatalog> {
        &self.catalog
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    pub fn state(&self) -> &Arc<ProjectionState> {
        &self.state
    }

    /// Extension used for display names and extension-less uploads
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Store new content and its first revision.
    ///
    /// Content already in the catalog is rejected: an active duplicate always, a
    /// deleted one unless its deletion allowed re-upload.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        original_name: &str,
        revision: Revision,
    ) -> Result<FileRecord, ApiError> {
        let revision = validate(revision)?;
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(ApiError::UploadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let hash = content_hash(bytes);
        if let Some(existing) = self.catalog.find_by_hash(&hash)? {
            match &existing.deleted {
                None => return Err(ApiError::DuplicateContent(existing.id)),
                Some(deletion) if !deletion.allow_reupload => {
                    return Err(ApiError::ReuploadBlocked(existing.id))
                }
                Some(_) => {}
            }
        }

        let id = FileId::new_v4();
        let relative_path = format!("{}.{}", id, self.storage_extension(original_name));
        self.content.store(&relative_path, bytes).await?;

        let record = FileRecord {
            id,
            relative_path,
            original_name: original_name.to_string(),
            size,
            hash,
            locked: false,
            uploaded_on: Utc::now(),
            rating: None,
            downloads: 0,
            revision,
            deleted: None,
        };
        self.catalog.upsert(&record)?;
        self.state.enqueue_reindex(id);

        info!(file_id = %id, size, "Ingested file");
        Ok(record)
    }

    /// Replace the current revision of an active file
    pub async fn edit(&self, id: FileId, revision: Revision) -> Result<FileRecord, ApiError> {
        let revision = validate(revision)?;
        self.active(id).await?;
        let record = self
            .catalog
            .modify(id, |record| record.revision = revision)
            .map_err(|e| not_found_as_file(e, id))?;
        self.state.enqueue_reindex(id);

        info!(file_id = %id, "Edited file revision");
        Ok(record)
    }

    /// Mark an active file deleted
    pub async fn delete(
        &self,
        id: FileId,
        reason: &str,
        allow_reupload: bool,
    ) -> Result<FileRecord, ApiError> {
        self.active(id).await?;
        let deletion = Deletion {
            reason: reason.trim().to_string(),
            deleted_on: Utc::now(),
            allow_reupload,
        };
        let record = self
            .catalog
            .mark_deleted(id, deletion)
            .map_err(|e| not_found_as_file(e, id))?;
        self.state.enqueue_remove(id);

        info!(file_id = %id, "Deleted file");
        Ok(record)
    }

    /// Count a completed download. Does not affect the share tree.
    pub async fn record_download(&self, id: FileId) {
        if let Err(e) = self.catalog.record_download(id).await {
            warn!(file_id = %id, error = %e, "Failed to record download");
        }
    }

    /// Active record by id
    pub async fn active(&self, id: FileId) -> Result<FileRecord, ApiError> {
        self.catalog
            .get_record(id)
            .await?
            .filter(|r| !r.is_deleted())
            .ok_or(ApiError::FileNotFound(id))
    }

    /// Records ordered by upload time, deleted ones only when asked
    pub fn list(&self, include_deleted: bool) -> Result<Vec<FileRecord>, ApiError> {
        let mut records: Vec<FileRecord> = self
            .catalog
            .list_all()?
            .into_iter()
            .filter(|r| include_deleted || !r.is_deleted())
            .collect();
        records.sort_by(|a, b| a.uploaded_on.cmp(&b.uploaded_on).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    fn storage_extension(&self, original_name: &str) -> String {
        Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| self.extension.clone())
    }
}

fn validate(revision: Revision) -> Result<Revision, ApiError> {
    let revision = revision.normalized();
    if segment_name(&revision.track_name).is_none() {
        return Err(ApiError::InvalidRevision(
            "track name must not be blank".to_string(),
        ));
    }
    Ok(revision)
}

fn not_found_as_file(e: CatalogError, id: FileId) -> ApiError {
    match e {
        CatalogError::NotFound(_) => ApiError::FileNotFound(id),
        other => other.into(),
    }
}
