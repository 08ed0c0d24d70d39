//! HTTP handlers, one module per path family.

pub mod config;
pub mod creds;
pub mod health;
pub mod leases;
pub mod roles;

pub use config::{
    delete_config_handler, patch_config_handler, read_config_handler, write_config_handler,
};
pub use creds::issue_credential_handler;
pub use health::{health_handler, HealthResponse};
pub use leases::{renew_lease_handler, revoke_lease_handler};
pub use roles::{
    delete_role_handler, list_roles_handler, patch_role_handler, read_role_handler,
    write_role_handler, RoleListResponse,
};
