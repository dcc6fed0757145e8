//! Mapping of core errors onto HTTP responses.

use api_shared::ErrorRes;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use consult_core::{ConsultError, ErrorKind};

/// A [`ConsultError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub ConsultError);

impl From<ConsultError> for ApiError {
    fn from(err: ConsultError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::IllegalState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Permission => "permission",
        ErrorKind::IllegalState => "illegal_state",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Transport => "transport",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let body = ErrorRes {
            kind: kind_label(kind).into(),
            message: self.0.to_string(),
            required_organisations: self.0.required_organisations().to_vec(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
