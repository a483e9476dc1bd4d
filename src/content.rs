//! Content Store
//!
//! Holds the bytes of uploaded files, addressed by the record's relative storage path.

use crate::error::ContentError;
use crate::types::ContentHash;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Hex-encoded blake3 digest of `bytes`
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    blake3::hash(bytes).to_hex().to_string()
}

/// Byte storage for uploaded files.
///
/// Reads return whole files rather than streams. Uploads are capped by
/// `storage.max_upload_bytes`, which bounds what a single fetch holds in memory.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read the full content stored at a record's `relative_path`
    async fn open_for_read(&self, relative_path: &str) -> Result<Vec<u8>, ContentError>;

    /// Write content at `relative_path`, replacing anything already there
    async fn store(&self, relative_path: &str, bytes: &[u8]) -> Result<(), ContentError>;
}

/// Content store on a local directory
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Use `root` as the storage directory, creating it when `create_missing` is set
    pub fn new(root: PathBuf, create_missing: bool) -> Result<Self, ContentError> {
        if create_missing {
            std::fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(ContentError::Missing(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, ContentError> {
        let rel = Path::new(relative_path);
        let is_plain = !relative_path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(ContentError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn open_for_read(&self, relative_path: &str) -> Result<Vec<u8>, ContentError> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ContentError::Missing(path)),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, relative_path: &str, bytes: &[u8]) -> Result<(), ContentError> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}
