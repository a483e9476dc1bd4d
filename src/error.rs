//! Error types for the catalog, content store, projection and API layers.

use crate::types::FileId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a catalog source
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Failed to encode catalog record: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Catalog record not found: {0}")]
    NotFound(FileId),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the content store
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content missing from storage: {0}")]
    Missing(PathBuf),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

/// Errors raised while resolving a share path against the projection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("{0} is a directory, not a file")]
    IsDirectory(String),

    #[error("{0} is a file, not a directory")]
    NotADirectory(String),
}

/// API-level errors surfaced to the CLI and HTTP layers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Projection is not ready yet")]
    NotReady {
        /// Seconds a client should wait before retrying
        retry_after_secs: u64,
    },

    #[error("File not found: {0}")]
    FileNotFound(FileId),

    #[error("Content already uploaded as {0}")]
    DuplicateContent(FileId),

    #[error("Content was deleted as {0} and may not be uploaded again")]
    ReuploadBlocked(FileId),

    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    #[error("Catalog fetch timed out for {0}")]
    FetchTimeout(FileId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
