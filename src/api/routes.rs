use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::backend::Backend;
use crate::observability::trace_http_requests;

use super::handlers::{
    delete_config_handler, delete_role_handler, health_handler, issue_credential_handler,
    list_roles_handler, patch_config_handler, patch_role_handler, read_config_handler,
    read_role_handler, renew_lease_handler, revoke_lease_handler, write_config_handler,
    write_role_handler,
};

#[derive(Clone)]
pub struct ApiState {
    pub backend: Arc<Backend>,
}

pub fn build_router(backend: Arc<Backend>) -> Router {
    let api_state = ApiState { backend };

    let engine = Router::new()
        .route(
            "/v1/config",
            get(read_config_handler)
                .post(write_config_handler)
                .put(write_config_handler)
                .patch(patch_config_handler)
                .delete(delete_config_handler),
        )
        .route("/v1/role", get(list_roles_handler))
        .route("/v1/role/", get(list_roles_handler))
        .route(
            "/v1/role/{name}",
            get(read_role_handler)
                .post(write_role_handler)
                .put(write_role_handler)
                .patch(patch_role_handler)
                .delete(delete_role_handler),
        )
        .route("/v1/creds/{name}", get(issue_credential_handler).post(issue_credential_handler))
        .route("/v1/leases/revoke", post(revoke_lease_handler))
        .route("/v1/leases/renew", post(renew_lease_handler))
        .with_state(api_state);

    Router::new()
        .route("/health", get(health_handler))
        .merge(engine)
        .layer(middleware::from_fn(trace_http_requests))
}
