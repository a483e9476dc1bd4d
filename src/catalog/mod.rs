//! Catalog Source
//!
//! The authoritative store of uploaded file records. Each record carries its current
//! revision (track/album/artist metadata) and its current deletion state. The
//! projection only ever reads from a catalog; mutations go through
//! [`crate::service::CatalogService`], which also notifies the projection.

pub mod memory;
pub mod persistence;

pub use memory::MemoryCatalog;
pub use persistence::SledCatalog;

use crate::error::CatalogError;
use crate::types::{ContentHash, FileId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current metadata of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Name of the track (required)
    pub track_name: String,
    /// Album the track belongs to
    #[serde(default)]
    pub album_name: Option<String>,
    /// Artists, in credit order
    #[serde(default)]
    pub artist_names: Vec<String>,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl Revision {
    pub fn new(track_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            album_name: None,
            artist_names: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_album(mut self, album_name: impl Into<String>) -> Self {
        self.album_name = Some(album_name.into());
        self
    }

    pub fn with_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artist_names = artists.into_iter().map(Into::into).collect();
        self
    }

    /// Trim every field, turn a blank album into `None` and drop blank artists.
    pub fn normalized(self) -> Self {
        let album_name = self
            .album_name
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let artist_names = self
            .artist_names
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            track_name: self.track_name.trim().to_string(),
            album_name,
            artist_names,
            description: self.description.trim().to_string(),
        }
    }

    /// Album name, if present and not blank
    pub fn album(&self) -> Option<&str> {
        self.album_name
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Non-blank artist names joined for display, if any
    pub fn artist_label(&self) -> Option<String> {
        let artists: Vec<&str> = self
            .artist_names
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if artists.is_empty() {
            None
        } else {
            Some(artists.join(", "))
        }
    }

    /// Download name of a file carrying this revision.
    ///
    /// `<artists>_<album>_<track>.<extension>`, absent components omitted. Each
    /// component is sanitised so the name is always a single path segment.
    pub fn display_name(&self, extension: &str) -> String {
        let mut parts = Vec::with_capacity(3);
        let artists: Vec<String> = self
            .artist_names
            .iter()
            .filter_map(|a| segment_name(a))
            .collect();
        if !artists.is_empty() {
            parts.push(artists.join(", "));
        }
        if let Some(album) = self.album().and_then(segment_name) {
            parts.push(album);
        }
        parts.push(segment_name(&self.track_name).unwrap_or_default());
        format!("{}.{}", parts.join("_"), extension)
    }
}

/// Replace characters that cannot appear inside a single share path segment.
pub fn sanitize_segment(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect()
}

/// Sanitised and trimmed `name`, or `None` when nothing printable is left
pub fn segment_name(name: &str) -> Option<String> {
    let cleaned = sanitize_segment(name);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Deletion marker of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    pub reason: String,
    pub deleted_on: DateTime<Utc>,
    /// Whether the same content may be uploaded again later
    pub allow_reupload: bool,
}

/// An uploaded file as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Location of the bytes relative to the content store root
    pub relative_path: String,
    pub original_name: String,
    pub size: u64,
    pub hash: ContentHash,
    pub locked: bool,
    pub uploaded_on: DateTime<Utc>,
    /// Aggregated rating score, if anyone has rated the file
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub downloads: u64,
    pub revision: Revision,
    #[serde(default)]
    pub deleted: Option<Deletion>,
}

impl FileRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn display_name(&self, extension: &str) -> String {
        self.revision.display_name(extension)
    }

    /// Entity tag used for conditional requests
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.hash)
    }
}

/// Read access to the catalog, as consumed by the projection and the protocol front.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Identifiers of every record that is not deleted
    async fn list_active_ids(&self) -> Result<Vec<FileId>, CatalogError>;

    /// Current state of a record, deleted or not. `None` if the id is unknown.
    async fn get_record(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError>;

    /// Whether an active (not deleted) record exists
    async fn exists(&self, id: FileId) -> Result<bool, CatalogError> {
        Ok(self
            .get_record(id)
            .await?
            .map(|r| !r.is_deleted())
            .unwrap_or(false))
    }

    /// Count a completed download. Sources without statistics ignore it.
    async fn record_download(&self, _id: FileId) -> Result<(), CatalogError> {
        Ok(())
    }
}
