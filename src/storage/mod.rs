//! # Storage and Persistence
//!
//! Key/value persistence for the configuration record and the roles. Values
//! are JSON documents stored as bytes under string keys such as `config` and
//! `role/<name>`.

pub mod memory;
pub mod pool;
pub mod sqlite;

pub use memory::InMemoryStorage;
pub use pool::{create_pool, DbPool};
pub use sqlite::SqliteStorage;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

/// Key/value store used by the engine.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, with the prefix stripped, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read and decode a JSON document.
pub async fn get_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
    match storage.get(key).await? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::serialization(e, format!("Failed to decode stored entry '{key}'"))),
    }
}

/// Encode and write a JSON document.
pub async fn put_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Error::serialization(e, format!("Failed to encode entry '{key}'")))?;
    storage.put(key, bytes).await
}

/// Open the storage backend selected by `config.url`.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    if config.is_memory() {
        tracing::info!(storage = "memory", "Using in-memory storage");
        return Ok(Arc::new(InMemoryStorage::new()));
    }

    if config.is_sqlite() {
        let pool = create_pool(config).await?;
        let storage = SqliteStorage::new(pool).await?;
        return Ok(Arc::new(storage));
    }

    Err(Error::config(format!("Unsupported storage URL scheme: {}", config.url)))
}
