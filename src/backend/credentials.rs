//! Credential issuance.
//!
//! Issuing a credential runs three ThingsDB procedures in order: create the
//! user, grant it the role's mask on the role's target, then mint a token for
//! it. A failing step stops the sequence and leaves earlier side effects on
//! the cluster in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::Backend;
use crate::domain::{normalize_role_name, IssuedCredential, LeasedSecret, Role};
use crate::errors::{Error, ProvisioningStep, Result};
use crate::observability::metrics;
use crate::thingsdb::{QueryClient, THINGSDB_SCOPE};

/// Produces `<nanos>_<role>` usernames.
///
/// The timestamp never repeats within one generator: when the clock has not
/// advanced past the last value handed out, the last value plus one is used.
#[derive(Debug, Default)]
pub struct UsernameGenerator {
    last: AtomicU64,
}

impl UsernameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    pub fn next(&self, role: &str) -> String {
        format!("{}_{}", self.next_stamp(), role)
    }
}

/// `grant` takes an integer mask; anything else is passed through for the
/// cluster to judge.
fn mask_value(mask: &str) -> Value {
    match mask.trim().parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(mask),
    }
}

impl Backend {
    /// Issue a fresh ThingsDB token under the named role.
    pub async fn issue_credential(&self, raw_name: &str) -> Result<LeasedSecret> {
        let name = normalize_role_name(raw_name)?;
        let role = self.get_role(&name).await?.ok_or_else(|| Error::role_not_found(&name))?;
        let client = self.get_client().await?;

        let credential = self.provision(&client, &role).await?;
        metrics::record_credential_issued(&role.name);
        info!(
            role = %role.name,
            user = %credential.user,
            token_id = %credential.token_id,
            "Issued ThingsDB credential"
        );

        Ok(LeasedSecret::for_credential(credential, &role))
    }

    async fn provision(
        &self,
        client: &Arc<dyn QueryClient>,
        role: &Role,
    ) -> Result<IssuedCredential> {
        let user = self.usernames().next(&role.name);

        self.run_step(
            client,
            ProvisioningStep::CreateUser,
            &user,
            "new_user(user);",
            json!({ "user": user }),
        )
        .await?;

        self.run_step(
            client,
            ProvisioningStep::Grant,
            &user,
            "grant(target, user, mask);",
            json!({ "target": role.target, "user": user, "mask": mask_value(&role.mask) }),
        )
        .await?;

        let token = match self
            .run_step(
                client,
                ProvisioningStep::NewToken,
                &user,
                "new_token(user);",
                json!({ "user": user }),
            )
            .await?
        {
            Value::String(token) if !token.is_empty() => token,
            other => {
                metrics::record_provisioning_failure(ProvisioningStep::NewToken);
                return Err(Error::provisioning(
                    ProvisioningStep::NewToken,
                    &user,
                    format!("expected a token string, got {}", value_kind(&other)),
                ));
            }
        };

        Ok(IssuedCredential { user, token, token_id: Uuid::new_v4().to_string() })
    }

    async fn run_step(
        &self,
        client: &Arc<dyn QueryClient>,
        step: ProvisioningStep,
        user: &str,
        code: &str,
        vars: Value,
    ) -> Result<Value> {
        let result = client
            .query(THINGSDB_SCOPE, code, vars)
            .instrument(crate::remote_span!(step.as_str(), user))
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                metrics::record_provisioning_failure(step);
                warn!(step = %step, user = %user, error = %e, "Provisioning step failed");
                if e.is_transport() {
                    self.discard_client(client).await;
                }
                Err(Error::provisioning(step, user, e.to_string()))
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "an empty string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
