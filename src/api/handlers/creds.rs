use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    domain::LeasedSecret,
};

/// Issue a credential for the role. The full leased secret is returned,
/// internal data included, since the lease manager hands it back on revoke
/// and renew.
#[instrument(skip(state), fields(role = %name))]
pub async fn issue_credential_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<LeasedSecret>, ApiError> {
    Ok(Json(state.backend.issue_credential(&name).await?))
}
