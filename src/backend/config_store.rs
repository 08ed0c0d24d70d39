//! Reading and writing the singleton connection configuration.

use tracing::info;

use super::{Backend, WriteMode};
use crate::domain::{ConfigUpdate, ConfigView, ConnectionConfig, Fields, CONFIG_KEY};
use crate::errors::{Error, Result};
use crate::storage::put_json;

impl Backend {
    /// Public view of the configuration (never the token).
    pub async fn read_config(&self) -> Result<ConfigView> {
        self.load_connection_config()
            .await?
            .map(|config| config.view())
            .ok_or_else(|| Error::not_found("config", CONFIG_KEY))
    }

    pub async fn config_exists(&self) -> Result<bool> {
        Ok(self.storage().get(CONFIG_KEY).await?.is_some())
    }

    /// Create or update the configuration from a write payload.
    ///
    /// Every field is parsed and validated before anything is persisted. A
    /// successful write drops the cached ThingsDB session.
    pub async fn write_config(&self, fields: &Fields, mode: WriteMode) -> Result<()> {
        let update = ConfigUpdate::from_fields(fields)?;
        let _writes = self.write_lock().await;

        let config = match self.load_connection_config().await? {
            Some(mut existing) => {
                existing.apply(update)?;
                existing
            }
            None if mode == WriteMode::UpdateOnly => {
                return Err(Error::not_found("config", CONFIG_KEY));
            }
            None => ConnectionConfig::create(update)?,
        };

        put_json(self.storage(), CONFIG_KEY, &config).await?;
        self.reset().await;

        info!(
            hostname = %config.hostname,
            port = config.port,
            insecure = config.insecure,
            "ThingsDB configuration written"
        );
        Ok(())
    }

    /// Remove the configuration and drop the cached session.
    pub async fn delete_config(&self) -> Result<()> {
        let _writes = self.write_lock().await;
        self.storage().delete(CONFIG_KEY).await?;
        self.reset().await;
        info!("ThingsDB configuration deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::backend::testing::{backend_with, FakeConnector};

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_omits_token() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        backend
            .write_config(
                &fields(json!({"hostname": "localhost", "port": 9200, "token": "T", "insecure": true})),
                WriteMode::Upsert,
            )
            .await
            .unwrap();

        let view = backend.read_config().await.unwrap();
        assert_eq!(
            serde_json::to_value(view).unwrap(),
            json!({"hostname": "localhost", "port": 9200, "insecure": true})
        );
    }

    #[tokio::test]
    async fn test_update_preserves_other_fields() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        backend
            .write_config(
                &fields(json!({"hostname": "localhost", "port": 9200, "token": "T", "insecure": false})),
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        backend
            .write_config(&fields(json!({"hostname": "db.internal"})), WriteMode::Upsert)
            .await
            .unwrap();

        let stored = backend.load_connection_config().await.unwrap().unwrap();
        assert_eq!(stored.hostname, "db.internal");
        assert_eq!(stored.port, 9200);
        assert_eq!(stored.token.expose_secret(), "T");
        assert!(!stored.insecure);
    }

    #[tokio::test]
    async fn test_update_only_on_missing_config_persists_nothing() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        let err = backend
            .write_config(&fields(json!({"hostname": "localhost"})), WriteMode::UpdateOnly)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!backend.config_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_with_missing_field_persists_nothing() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        let err = backend
            .write_config(
                &fields(json!({"hostname": "localhost", "port": 9200, "insecure": true})),
                WriteMode::Upsert,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { field: Some(ref f), .. } if f == "token"));
        assert!(!backend.config_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_port_is_rejected() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        let err = backend
            .write_config(
                &fields(json!({"hostname": "localhost", "port": "nine", "token": "T", "insecure": true})),
                WriteMode::Upsert,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { field: Some(ref f), .. } if f == "port"));
    }

    #[tokio::test]
    async fn test_read_missing_config() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        assert!(matches!(backend.read_config().await.unwrap_err(), Error::NotFound { .. }));
    }
}
