//! Domain layer
//!
//! Plain data types of the credential engine and the rules that govern them.
//! Nothing here touches storage or the network.
//!
//! ## Module Organization
//!
//! - `config`: ThingsDB connection configuration and its update rules
//! - `role`: role templates, name validation and TTL bounds
//! - `secret`: leased secrets exchanged with the lease manager
//! - `fields`: parsing of loosely typed write payloads
//! - `secret_string`: redacting wrapper for the admin token

pub mod config;
pub mod fields;
pub mod role;
pub mod secret;
pub mod secret_string;

pub use config::{ConfigUpdate, ConfigView, ConnectionConfig, CONFIG_KEY};
pub use fields::Fields;
pub use role::{normalize_role_name, role_key, Role, RoleUpdate, ROLE_PREFIX};
pub use secret::{IssuedCredential, Lease, LeasedSecret, THINGSDB_TOKEN_TYPE};
pub use secret_string::SecretString;
