//! Core types shared by the catalog, projection and protocol layers.

/// FileId: unique identifier of an uploaded file record
pub type FileId = uuid::Uuid;

/// ContentHash: hex-encoded blake3 digest of a file's bytes
pub type ContentHash = String;
