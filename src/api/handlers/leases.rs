//! Hooks called by the external lease manager.

use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    domain::LeasedSecret,
};

#[instrument(skip(state, secret), fields(secret_type = %secret.secret_type))]
pub async fn revoke_lease_handler(
    State(state): State<ApiState>,
    Json(secret): Json<LeasedSecret>,
) -> Result<StatusCode, ApiError> {
    state.backend.revoke(&secret).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, secret), fields(secret_type = %secret.secret_type))]
pub async fn renew_lease_handler(
    State(state): State<ApiState>,
    Json(secret): Json<LeasedSecret>,
) -> Result<Json<LeasedSecret>, ApiError> {
    Ok(Json(state.backend.renew(&secret).await?))
}
