//! Role management handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    backend::WriteMode,
    domain::{Fields, Role},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleListResponse {
    pub keys: Vec<String>,
}

#[instrument(skip(state))]
pub async fn list_roles_handler(
    State(state): State<ApiState>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let keys = state.backend.list_roles().await?;
    Ok(Json(RoleListResponse { keys }))
}

#[instrument(skip(state), fields(role = %name))]
pub async fn read_role_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.backend.read_role(&name).await?))
}

#[instrument(skip(state, payload), fields(role = %name))]
pub async fn write_role_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(payload): Json<Fields>,
) -> Result<StatusCode, ApiError> {
    state.backend.write_role(&name, &payload, WriteMode::Upsert).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload), fields(role = %name))]
pub async fn patch_role_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(payload): Json<Fields>,
) -> Result<StatusCode, ApiError> {
    state.backend.write_role(&name, &payload, WriteMode::UpdateOnly).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(role = %name))]
pub async fn delete_role_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.backend.delete_role(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
