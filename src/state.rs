use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::storage::{MemoryStorage, SftpStorage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = Database::connect(&config.database_url, config.database_max_connections).await?;
        db.migrate().await?;

        let storage = Arc::new(SftpStorage::new(config.sftp.clone())) as Arc<dyn StorageClient>;

        Ok(Self {
            db,
            config,
            storage,
        })
    }

    pub fn from_parts(db: Database, config: Arc<AppConfig>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            db,
            config,
            storage,
        }
    }

    /// In-memory database and storage with the test config.
    pub async fn fake() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::for_tests());
        let db = Database::in_memory().await?;
        db.migrate().await?;
        let storage = Arc::new(MemoryStorage::new(config.sftp.upload_dir.clone())) as Arc<dyn StorageClient>;
        Ok(Self::from_parts(db, config, storage))
    }
}
