//! ThingsDB connection configuration.

use serde::{Deserialize, Serialize};

use super::fields::{bool_field, port_field, string_field, Fields};
use super::secret_string::{serialize_exposed, SecretString};
use crate::errors::{Error, Result};

/// Storage key of the singleton configuration record.
pub const CONFIG_KEY: &str = "config";

/// Connection details for the ThingsDB cluster.
///
/// The serialized form is the persisted record and carries the raw token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    #[serde(serialize_with = "serialize_exposed")]
    pub token: SecretString,
    pub insecure: bool,
}

/// Fields supplied by a configuration write. Unset fields keep their value on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub token: Option<SecretString>,
    pub insecure: Option<bool>,
}

/// What a configuration read returns. Never includes the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigView {
    pub hostname: String,
    pub port: u16,
    pub insecure: bool,
}

impl ConfigUpdate {
    pub fn from_fields(fields: &Fields) -> Result<Self> {
        Ok(Self {
            hostname: string_field(fields, "hostname")?,
            port: port_field(fields, "port")?,
            token: string_field(fields, "token")?.map(SecretString::from),
            insecure: bool_field(fields, "insecure")?,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::validation_field(format!("missing {field} in configuration"), field)
}

impl ConnectionConfig {
    /// Build a new record; every field is required.
    pub fn create(update: ConfigUpdate) -> Result<Self> {
        let config = Self {
            hostname: update.hostname.ok_or_else(|| missing("hostname"))?,
            port: update.port.ok_or_else(|| missing("port"))?,
            token: update.token.ok_or_else(|| missing("token"))?,
            insecure: update.insecure.ok_or_else(|| missing("insecure"))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Overwrite the provided fields, keeping the rest.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(hostname) = update.hostname {
            next.hostname = hostname;
        }
        if let Some(port) = update.port {
            next.port = port;
        }
        if let Some(token) = update.token {
            next.token = token;
        }
        if let Some(insecure) = update.insecure {
            next.insecure = insecure;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::validation_field("hostname cannot be empty", "hostname"));
        }
        if self.token.is_empty() {
            return Err(Error::validation_field("token cannot be empty", "token"));
        }
        Ok(())
    }

    pub fn view(&self) -> ConfigView {
        ConfigView { hostname: self.hostname.clone(), port: self.port, insecure: self.insecure }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_update() -> ConfigUpdate {
        ConfigUpdate {
            hostname: Some("localhost".into()),
            port: Some(9200),
            token: Some("T".into()),
            insecure: Some(true),
        }
    }

    #[test]
    fn test_create_requires_every_field() {
        for strip in ["hostname", "port", "token", "insecure"] {
            let mut update = full_update();
            match strip {
                "hostname" => update.hostname = None,
                "port" => update.port = None,
                "token" => update.token = None,
                _ => update.insecure = None,
            }

            match ConnectionConfig::create(update).unwrap_err() {
                Error::Validation { field, .. } => assert_eq!(field.as_deref(), Some(strip)),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let mut config = ConnectionConfig::create(full_update()).unwrap();
        config
            .apply(ConfigUpdate { hostname: Some("db.internal".into()), ..Default::default() })
            .unwrap();

        assert_eq!(config.hostname, "db.internal");
        assert_eq!(config.port, 9200);
        assert_eq!(config.token.expose_secret(), "T");
        assert!(config.insecure);
    }

    #[test]
    fn test_failed_apply_leaves_record_untouched() {
        let mut config = ConnectionConfig::create(full_update()).unwrap();
        let err = config.apply(ConfigUpdate { token: Some("".into()), ..Default::default() });

        assert!(err.is_err());
        assert_eq!(config.token.expose_secret(), "T");
    }

    #[test]
    fn test_persisted_form_keeps_token_and_view_drops_it() {
        let config = ConnectionConfig::create(full_update()).unwrap();

        let stored = serde_json::to_value(&config).unwrap();
        assert_eq!(
            stored,
            json!({"hostname": "localhost", "port": 9200, "token": "T", "insecure": true})
        );

        let view = serde_json::to_value(config.view()).unwrap();
        assert_eq!(view, json!({"hostname": "localhost", "port": 9200, "insecure": true}));
    }

    #[test]
    fn test_update_from_fields() {
        let fields = json!({"hostname": "localhost", "port": "9200", "insecure": "true"});
        let update = ConfigUpdate::from_fields(fields.as_object().unwrap()).unwrap();

        assert_eq!(update.port, Some(9200));
        assert_eq!(update.insecure, Some(true));
        assert!(update.token.is_none());
    }
}
