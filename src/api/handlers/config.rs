//! Handlers for the singleton `config` path.

use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    backend::WriteMode,
    domain::{ConfigView, Fields},
};

#[instrument(skip(state))]
pub async fn read_config_handler(
    State(state): State<ApiState>,
) -> Result<Json<ConfigView>, ApiError> {
    Ok(Json(state.backend.read_config().await?))
}

/// POST and PUT: create when absent, update when present.
#[instrument(skip(state, payload), fields(field_count = payload.len()))]
pub async fn write_config_handler(
    State(state): State<ApiState>,
    Json(payload): Json<Fields>,
) -> Result<StatusCode, ApiError> {
    state.backend.write_config(&payload, WriteMode::Upsert).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload), fields(field_count = payload.len()))]
pub async fn patch_config_handler(
    State(state): State<ApiState>,
    Json(payload): Json<Fields>,
) -> Result<StatusCode, ApiError> {
    state.backend.write_config(&payload, WriteMode::UpdateOnly).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_config_handler(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    state.backend.delete_config().await?;
    Ok(StatusCode::NO_CONTENT)
}
