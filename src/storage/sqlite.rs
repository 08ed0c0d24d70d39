//! SQLite storage backend.

use async_trait::async_trait;
use sqlx::Row;
use tracing::Instrument;

use super::{DbPool, Storage};
use crate::errors::{Error, Result};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
)";

/// Durable store keeping every entry as one row of `kv_store`.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    /// Wrap `pool`, creating the table if it does not exist yet.
    pub async fn new(pool: DbPool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| Error::database(e, "Failed to create kv_store table"))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(crate::db_span!("get", key = %key))
            .await
            .map_err(|e| Error::database(e, format!("Failed to read '{key}'")))?;

        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to write '{key}'")))?;

        tracing::debug!(key = %key, "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e, format!("Failed to delete '{key}'")))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to list '{prefix}'")))?;

        Ok(rows
            .iter()
            .map(|row| {
                let key: String = row.get("key");
                key[prefix.len()..].to_string()
            })
            .collect())
    }
}
