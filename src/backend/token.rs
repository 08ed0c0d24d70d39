//! Revocation and renewal hooks called by the lease manager.

use serde_json::json;
use tracing::{info, warn, Instrument};

use super::Backend;
use crate::domain::LeasedSecret;
use crate::errors::{Error, Result};
use crate::observability::metrics;
use crate::thingsdb::THINGSDB_SCOPE;

impl Backend {
    /// Delete the ThingsDB user behind a lease.
    ///
    /// The secret type and user are checked before a session is requested,
    /// so a foreign or corrupt lease fails without touching the cluster.
    /// Remote errors are returned as is; the lease manager owns retries.
    pub async fn revoke(&self, secret: &LeasedSecret) -> Result<()> {
        secret.ensure_thingsdb_token()?;
        let user = secret.user()?;
        let client = self.get_client().await?;

        let result = client
            .query(THINGSDB_SCOPE, "del_user(user);", json!({ "user": user }))
            .instrument(crate::remote_span!("del_user", user))
            .await;

        if let Err(e) = result {
            warn!(user = %user, error = %e, "Failed to delete ThingsDB user");
            if e.is_transport() {
                self.discard_client(&client).await;
            }
            return Err(Error::revocation(user, e.to_string()));
        }

        metrics::record_credential_revoked();
        info!(user = %user, "Revoked ThingsDB credential");
        Ok(())
    }

    /// Re-read the role behind a lease and refresh its bounds.
    ///
    /// Only nonzero role bounds overwrite the lease; everything else in the
    /// secret is returned unchanged.
    pub async fn renew(&self, secret: &LeasedSecret) -> Result<LeasedSecret> {
        secret.ensure_thingsdb_token()?;
        let role_name = secret.role()?;
        let role = self
            .get_role(role_name)
            .await?
            .ok_or_else(|| Error::role_not_found(role_name))?;

        let mut renewed = secret.clone();
        renewed.lease.apply_role(&role);

        metrics::record_credential_renewed(&role.name);
        info!(role = %role.name, "Renewed ThingsDB credential lease");
        Ok(renewed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::*;
    use crate::backend::testing::{backend_with, FakeConnector};
    use crate::backend::WriteMode;
    use crate::domain::{Fields, Lease};
    use crate::thingsdb::ThingsDbError;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn configured(connector: Arc<FakeConnector>, role: Value) -> Backend {
        let backend = backend_with(connector);
        backend
            .write_config(
                &fields(json!({"hostname": "localhost", "port": 9200, "token": "T", "insecure": true})),
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        backend.write_role("reader", &fields(role), WriteMode::Upsert).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn test_revoke_deletes_captured_user() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector.clone(), json!({"target": "//stuff", "mask": 31})).await;
        let secret = backend.issue_credential("reader").await.unwrap();

        backend.revoke(&secret).await.unwrap();

        let deletes = connector.client.calls_to("del_user");
        assert_eq!(deletes, vec![json!({"user": secret.user().unwrap()})]);
    }

    #[tokio::test]
    async fn test_second_revoke_reaches_cluster() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector.clone(), json!({"target": "//stuff", "mask": 31})).await;
        let secret = backend.issue_credential("reader").await.unwrap();

        backend.revoke(&secret).await.unwrap();
        connector.client.fail_next("del_user", 404);
        let err = backend.revoke(&secret).await.unwrap_err();

        assert!(matches!(err, Error::Revocation { .. }));
        assert_eq!(connector.client.calls_to("del_user").len(), 2);
    }

    #[tokio::test]
    async fn test_revoke_malformed_secret_skips_connect() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector.clone(), json!({"target": "//stuff", "mask": 31})).await;

        let missing: LeasedSecret =
            serde_json::from_value(json!({"secret_type": "thingsdb_token"})).unwrap();
        let wrong_type: LeasedSecret = serde_json::from_value(json!({
            "secret_type": "thingsdb_token",
            "internal_data": {"user": ["not", "a", "string"]}
        }))
        .unwrap();

        for secret in [missing, wrong_type] {
            let err = backend.revoke(&secret).await.unwrap_err();
            assert!(matches!(err, Error::MalformedSecret { .. }));
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_renew_picks_up_new_bounds_without_remote_calls() {
        let connector = Arc::new(FakeConnector::default());
        let backend =
            configured(connector.clone(), json!({"target": "//stuff", "mask": 31, "ttl": 60})).await;
        let secret = backend.issue_credential("reader").await.unwrap();
        let calls_before = connector.client.calls().len();

        backend
            .write_role("reader", &fields(json!({"ttl": 120, "max_ttl": 600})), WriteMode::UpdateOnly)
            .await
            .unwrap();
        let renewed = backend.renew(&secret).await.unwrap();

        assert_eq!(renewed.lease.ttl, Some(Duration::from_secs(120)));
        assert_eq!(renewed.lease.max_ttl, Some(Duration::from_secs(600)));
        assert_eq!(renewed.data, secret.data);
        assert_eq!(renewed.internal_data, secret.internal_data);
        assert_eq!(connector.client.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_renew_keeps_lease_when_role_bounds_are_zero() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector, json!({"target": "//stuff", "mask": 31})).await;
        let mut secret = backend.issue_credential("reader").await.unwrap();
        secret.lease = Lease { ttl: Some(Duration::from_secs(45)), max_ttl: None };

        let renewed = backend.renew(&secret).await.unwrap();
        assert_eq!(renewed.lease, secret.lease);
    }

    #[tokio::test]
    async fn test_renew_after_role_deleted() {
        let connector = Arc::new(FakeConnector::default());
        let backend =
            configured(connector, json!({"target": "//stuff", "mask": 31, "ttl": 60})).await;
        let secret = backend.issue_credential("reader").await.unwrap();

        backend.delete_role("reader").await.unwrap();
        let err = backend.renew(&secret).await.unwrap_err();

        assert!(matches!(err, Error::RoleNotFound { .. }));
        assert_eq!(secret.lease.ttl, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_renew_malformed_secret() {
        let backend = backend_with(Arc::new(FakeConnector::default()));
        let secret: LeasedSecret = serde_json::from_value(json!({
            "secret_type": "thingsdb_token",
            "internal_data": {"user": "1_reader"}
        }))
        .unwrap();

        assert!(matches!(backend.renew(&secret).await.unwrap_err(), Error::MalformedSecret { .. }));
    }

    #[tokio::test]
    async fn test_foreign_secret_type_is_rejected() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector.clone(), json!({"target": "//stuff", "mask": 31})).await;
        let mut secret = backend.issue_credential("reader").await.unwrap();
        secret.secret_type = "other".to_string();
        let calls_before = connector.client.calls().len();

        let err = backend.revoke(&secret).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSecret { ref field, .. } if field == "secret_type"));
        let err = backend.renew(&secret).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSecret { ref field, .. } if field == "secret_type"));

        assert_eq!(connector.client.calls().len(), calls_before);
        assert!(connector.client.calls_to("del_user").is_empty());
    }

    #[tokio::test]
    async fn test_revoke_reconnects_after_closed_session() {
        let connector = Arc::new(FakeConnector::default());
        let backend = configured(connector.clone(), json!({"target": "//stuff", "mask": 31})).await;
        let secret = backend.issue_credential("reader").await.unwrap();
        connector.client.fail_next_with("del_user", ThingsDbError::Closed);

        let err = backend.revoke(&secret).await.unwrap_err();
        assert!(matches!(err, Error::Revocation { .. }));
        assert_eq!(connector.connect_count(), 1);

        backend.revoke(&secret).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(connector.client.calls_to("del_user").len(), 2);
    }
}
