//! Store factory: opens the backend selected in configuration.
//!
//! Runs once at startup. Call sites receive an `Arc<dyn RecordStore>` and
//! never branch on the backend again.

use std::sync::Arc;

use tracing::info;
use vitalbot_config::{StorageBackend, StorageConfig};
use vitalbot_core::error::StoreError;
use vitalbot_core::store::RecordStore;

/// Open the configured backend. The schema is not initialized here.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match config.backend {
        StorageBackend::Sqlite => open_sqlite(config).await?,
        StorageBackend::Postgres => open_postgres(config).await?,
    };

    info!(backend = store.name(), "Record store opened");
    Ok(store)
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store = crate::sqlite::SqliteStore::open(&config.sqlite_path, config.max_connections).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    Err(StoreError::Unavailable(
        "SQLite support is not enabled. Enable the 'sqlite' feature.".into(),
    ))
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".into()))?;
    let store = crate::postgres::PostgresStore::connect(url, config.max_connections).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    Err(StoreError::Unavailable(
        "PostgreSQL support is not enabled. Enable the 'postgres' feature.".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_sqlite_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            sqlite_path: dir.path().join("bp.db").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn postgres_without_url_is_unavailable() {
        let config = StorageConfig {
            backend: StorageBackend::Postgres,
            database_url: None,
            ..StorageConfig::default()
        };
        assert!(matches!(
            open_store(&config).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
