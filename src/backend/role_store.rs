//! Role persistence.

use tracing::info;

use super::{Backend, WriteMode};
use crate::domain::{normalize_role_name, role_key, Fields, Role, RoleUpdate, ROLE_PREFIX};
use crate::errors::{Error, Result};
use crate::storage::{get_json, put_json};

impl Backend {
    /// Load a role by (already normalised) name.
    pub async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        if name.is_empty() {
            return Err(Error::validation_field("missing role name", "name"));
        }
        get_json(self.storage(), &role_key(name)).await
    }

    /// Load a role, mapping absence to a not-found error.
    pub async fn read_role(&self, raw_name: &str) -> Result<Role> {
        let name = normalize_role_name(raw_name)?;
        self.get_role(&name).await?.ok_or_else(|| Error::not_found("role", name))
    }

    /// Create or update a role. Nothing is persisted unless the result is valid.
    pub async fn write_role(&self, raw_name: &str, fields: &Fields, mode: WriteMode) -> Result<Role> {
        let name = normalize_role_name(raw_name)?;
        let update = RoleUpdate::from_fields(fields)?;
        let _writes = self.write_lock().await;

        let role = match self.get_role(&name).await? {
            Some(mut existing) => {
                existing.apply(update)?;
                existing
            }
            None if mode == WriteMode::UpdateOnly => return Err(Error::not_found("role", name)),
            None => Role::create(name, update)?,
        };

        put_json(self.storage(), &role.key(), &role).await?;
        info!(
            role = %role.name,
            target = %role.target,
            ttl_secs = role.ttl.as_secs(),
            max_ttl_secs = role.max_ttl.as_secs(),
            "Role written"
        );
        Ok(role)
    }

    pub async fn delete_role(&self, raw_name: &str) -> Result<()> {
        let name = normalize_role_name(raw_name)?;
        let _writes = self.write_lock().await;
        self.storage().delete(&role_key(&name)).await?;
        info!(role = %name, "Role deleted");
        Ok(())
    }

    /// Role names in ascending order.
    pub async fn list_roles(&self) -> Result<Vec<String>> {
        self.storage().list(ROLE_PREFIX).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::backend::testing::{backend_with, FakeConnector};
    use crate::storage::{InMemoryStorage, Storage};

    /// Yields on every read so concurrent writers interleave.
    #[derive(Default)]
    struct YieldingStorage(InMemoryStorage);

    #[async_trait]
    impl Storage for YieldingStorage {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            let value = self.0.get(key).await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(value)
        }

        async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.0.put(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.0.delete(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.0.list(prefix).await
        }
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn backend() -> Backend {
        backend_with(Arc::new(FakeConnector::default()))
    }

    #[tokio::test]
    async fn test_write_and_read_role() {
        let backend = backend();
        backend
            .write_role(
                "Test-User-Token",
                &fields(json!({"target": "//stuff", "mask": "31", "ttl": "1h"})),
                WriteMode::Upsert,
            )
            .await
            .unwrap();

        let role = backend.read_role("test-user-token").await.unwrap();
        assert_eq!(role.name, "test-user-token");
        assert_eq!(role.target, "//stuff");
        assert_eq!(role.mask, "31");
        assert_eq!(role.ttl, Duration::from_secs(3600));
        assert_eq!(role.max_ttl, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_ttl_above_max_is_not_persisted() {
        let backend = backend();
        let err = backend
            .write_role(
                "reader",
                &fields(json!({"target": "//stuff", "mask": "31", "ttl": 600, "max_ttl": 60})),
                WriteMode::Upsert,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("ttl cannot be greater than max_ttl"));
        assert!(backend.get_role("reader").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_fields() {
        let backend = backend();
        backend
            .write_role(
                "reader",
                &fields(json!({"target": "//stuff", "mask": "31", "max_ttl": 600})),
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        let role = backend
            .write_role("reader", &fields(json!({"ttl": 300})), WriteMode::UpdateOnly)
            .await
            .unwrap();

        assert_eq!(role.target, "//stuff");
        assert_eq!(role.ttl, Duration::from_secs(300));
        assert_eq!(role.max_ttl, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_update_only_on_missing_role() {
        let backend = backend();
        let err = backend
            .write_role("ghost", &fields(json!({"ttl": 300})), WriteMode::UpdateOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let backend = backend();
        for name in ["writer", "Admin", "reader"] {
            backend
                .write_role(name, &fields(json!({"target": "//x", "mask": 1})), WriteMode::Upsert)
                .await
                .unwrap();
        }

        assert_eq!(backend.list_roles().await.unwrap(), vec!["admin", "reader", "writer"]);

        backend.delete_role("reader").await.unwrap();
        assert_eq!(backend.list_roles().await.unwrap(), vec!["admin", "writer"]);
        assert!(matches!(backend.read_role("reader").await.unwrap_err(), Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let backend = backend();
        let err = backend
            .write_role("bad/name", &fields(json!({"target": "//x", "mask": "1"})), WriteMode::Upsert)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let backend = Arc::new(Backend::new(
            Arc::new(YieldingStorage::default()),
            Arc::new(FakeConnector::default()),
        ));
        backend
            .write_role("reader", &fields(json!({"target": "//x", "mask": 1})), WriteMode::Upsert)
            .await
            .unwrap();

        let target = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .write_role("reader", &fields(json!({"target": "//y"})), WriteMode::UpdateOnly)
                    .await
            })
        };
        let mask = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .write_role("reader", &fields(json!({"mask": 31})), WriteMode::UpdateOnly)
                    .await
            })
        };
        target.await.unwrap().unwrap();
        mask.await.unwrap().unwrap();

        let role = backend.read_role("reader").await.unwrap();
        assert_eq!(role.target, "//y");
        assert_eq!(role.mask, "31");
    }
}
