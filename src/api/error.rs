use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::Error;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PreconditionFailed(String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::PreconditionFailed(_) => "precondition_failed",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error = self.kind();

        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::PreconditionFailed(msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { message, .. } => ApiError::BadRequest(message),
            Error::MalformedSecret { .. } => ApiError::BadRequest(err.to_string()),
            Error::NotFound { .. } | Error::RoleNotFound { .. } => ApiError::NotFound(err.to_string()),
            Error::ConfigurationMissing => ApiError::PreconditionFailed(err.to_string()),
            Error::Connection { .. }
            | Error::Authentication { .. }
            | Error::Provisioning { .. }
            | Error::Revocation { .. } => {
                warn!(error = %err, "ThingsDB request failed");
                ApiError::BadGateway(err.to_string())
            }
            Error::Config { .. }
            | Error::Database { .. }
            | Error::Serialization { .. }
            | Error::Io { .. } => {
                error!(error = ?err, "Internal error while handling request");
                ApiError::Internal(err.to_string())
            }
        }
    }
}
