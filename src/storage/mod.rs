//! Remote object storage behind a small trait, so handlers never see SSH.

mod memory;
mod sftp;

pub use memory::MemoryStorage;
pub use sftp::SftpStorage;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage timed out: {0}")]
    Timeout(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation failed: {0}")]
    Other(String),
}

impl StorageError {
    /// Whether a fresh connection might succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Timeout(_) | StorageError::Unavailable(_))
    }
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Writes `body` under `name` in the upload directory and returns the remote path.
    async fn put_object(&self, name: &str, body: Bytes) -> Result<String, StorageError>;

    /// Reads the object stored at `key`, relative to the upload directory.
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;
}

/// Joins the upload directory and a relative key with exactly one `/`.
pub(crate) fn remote_path(dir: &str, key: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    format!("{}/{}", dir, key)
}
