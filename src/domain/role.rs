//! Roles: named templates for the ThingsDB privileges and lease bounds of
//! issued credentials.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::fields::{duration_field, string_field, Fields};
use crate::errors::{Error, Result};

/// Storage prefix under which roles are kept.
pub const ROLE_PREFIX: &str = "role/";

lazy_static! {
    // Word characters, with '-' and '.' allowed anywhere but the ends.
    static ref ROLE_NAME_REGEX: Regex = Regex::new(r"^\w(([\w\-.]+)?\w)?$")
        .expect("BUG: ROLE_NAME_REGEX pattern is invalid - validated by tests");
}

/// Lower-case and validate a role name taken from a request path.
pub fn normalize_role_name(raw: &str) -> Result<String> {
    let name = raw.to_lowercase();
    if !ROLE_NAME_REGEX.is_match(&name) {
        return Err(Error::validation_field(format!("invalid role name '{raw}'"), "name"));
    }
    Ok(name)
}

pub fn role_key(name: &str) -> String {
    format!("{ROLE_PREFIX}{name}")
}

/// A persisted role. Durations are stored as whole seconds; zero means
/// "use the lease manager's default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub target: String,
    pub mask: String,
    #[serde(with = "seconds")]
    pub ttl: Duration,
    #[serde(with = "seconds")]
    pub max_ttl: Duration,
}

/// Fields supplied by a role write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    pub target: Option<String>,
    pub mask: Option<String>,
    pub ttl: Option<Duration>,
    pub max_ttl: Option<Duration>,
}

impl RoleUpdate {
    pub fn from_fields(fields: &Fields) -> Result<Self> {
        Ok(Self {
            target: string_field(fields, "target")?,
            mask: string_field(fields, "mask")?,
            ttl: duration_field(fields, "ttl")?,
            max_ttl: duration_field(fields, "max_ttl")?,
        })
    }
}

impl Role {
    /// Build a new role. `target` and `mask` are required, the durations default to zero.
    pub fn create(name: impl Into<String>, update: RoleUpdate) -> Result<Self> {
        let role = Self {
            name: name.into(),
            target: update
                .target
                .ok_or_else(|| Error::validation_field("missing target in role", "target"))?,
            mask: update
                .mask
                .ok_or_else(|| Error::validation_field("missing mask in role", "mask"))?,
            ttl: update.ttl.unwrap_or_default(),
            max_ttl: update.max_ttl.unwrap_or_default(),
        };
        role.validate()?;
        Ok(role)
    }

    /// Overwrite the provided fields. On error the role is left unchanged.
    pub fn apply(&mut self, update: RoleUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(target) = update.target {
            next.target = target;
        }
        if let Some(mask) = update.mask {
            next.mask = mask;
        }
        if let Some(ttl) = update.ttl {
            next.ttl = ttl;
        }
        if let Some(max_ttl) = update.max_ttl {
            next.max_ttl = max_ttl;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(Error::validation_field("ttl cannot be greater than max_ttl", "ttl"));
        }
        Ok(())
    }

    pub fn key(&self) -> String {
        role_key(&self.name)
    }
}

/// Serialize a `Duration` as whole seconds.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
