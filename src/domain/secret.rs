//! Leased secrets handed to the lease manager.
//!
//! A secret carries two maps: `data` is shown to the requester, while
//! `internal_data` comes back verbatim on revoke and renew and is the only link
//! between a lease and the ThingsDB user behind it. Because it round-trips
//! through an external system it is kept untyped and checked field by field.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::role::Role;
use crate::errors::{Error, Result};

/// Secret type tag of issued ThingsDB tokens.
pub const THINGSDB_TOKEN_TYPE: &str = "thingsdb_token";

/// Lease bounds. `None` leaves the choice to the lease manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "option_seconds")]
    pub ttl: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "option_seconds")]
    pub max_ttl: Option<Duration>,
}

impl Lease {
    /// Take the role's bounds where they are nonzero; other fields are left as they are.
    pub fn apply_role(&mut self, role: &Role) {
        if !role.ttl.is_zero() {
            self.ttl = Some(role.ttl);
        }
        if !role.max_ttl.is_zero() {
            self.max_ttl = Some(role.max_ttl);
        }
    }

    pub fn from_role(role: &Role) -> Self {
        let mut lease = Self::default();
        lease.apply_role(role);
        lease
    }
}

/// Freshly minted ThingsDB credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub user: String,
    pub token: String,
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeasedSecret {
    pub secret_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub internal_data: Map<String, Value>,
    #[serde(default)]
    pub lease: Lease,
}

impl LeasedSecret {
    /// Package a credential issued under `role`.
    pub fn for_credential(credential: IssuedCredential, role: &Role) -> Self {
        let mut data = Map::new();
        data.insert("token".into(), Value::String(credential.token.clone()));
        data.insert("token_id".into(), Value::String(credential.token_id));
        data.insert("user".into(), Value::String(credential.user.clone()));

        let mut internal_data = Map::new();
        internal_data.insert("token".into(), Value::String(credential.token));
        internal_data.insert("role".into(), Value::String(role.name.clone()));
        internal_data.insert("user".into(), Value::String(credential.user));

        Self {
            secret_type: THINGSDB_TOKEN_TYPE.to_string(),
            data,
            internal_data,
            lease: Lease::from_role(role),
        }
    }

    /// Fail unless this lease was issued by this engine.
    pub fn ensure_thingsdb_token(&self) -> Result<()> {
        if self.secret_type == THINGSDB_TOKEN_TYPE {
            Ok(())
        } else {
            Err(Error::malformed_secret(
                "secret_type",
                format!("is '{}', expected '{THINGSDB_TOKEN_TYPE}'", self.secret_type),
            ))
        }
    }

    /// Read a string field of the internal data.
    pub fn internal_str(&self, field: &str) -> Result<&str> {
        match self.internal_data.get(field) {
            None => Err(Error::malformed_secret(field, "is missing from internal data")),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(Error::malformed_secret(field, "is not a string")),
        }
    }

    pub fn user(&self) -> Result<&str> {
        self.internal_str("user")
    }

    pub fn role(&self) -> Result<&str> {
        self.internal_str("role")
    }
}

mod option_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
