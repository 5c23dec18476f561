use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{remote_path, StorageClient, StorageError};

/// Process-local storage used by `AppState::fake()` and the integration tests.
pub struct MemoryStorage {
    upload_dir: String,
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new(upload_dir: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> Result<String, StorageError> {
        let path = remote_path(&self.upload_dir, name);
        self.objects.write().await.insert(path.clone(), body);
        Ok(path)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = remote_path(&self.upload_dir, key);
        self.objects
            .read()
            .await
            .get(&path)
            .cloned()
            .ok_or(StorageError::NotFound(path))
    }
}
