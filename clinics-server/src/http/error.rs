//! API error type with IntoResponse
//!
//! Domain errors map to status codes by [`ErrorKind`]. Internal failures are
//! logged here and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinics_core::{Error, ErrorKind};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Error returned by a registry use case
    Domain(Error),

    /// Malformed path or query parameter (400)
    InvalidParameter { name: &'static str, reason: String },

    /// Request body could not be decoded (400)
    InvalidBody { message: String },
}

impl ApiError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidParameter { .. } | Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Domain(e) if e.kind() == ErrorKind::Internal => {
                tracing::error!(error = %e, "internal error");
                json!({
                    "error": ErrorKind::Internal.as_str(),
                    "message": "an internal error occurred"
                })
            }
            Self::Domain(e) => json!({
                "error": e.kind().as_str(),
                "message": e.detail()
            }),
            Self::InvalidParameter { name, reason } => json!({
                "error": ErrorKind::Validation.as_str(),
                "message": format!("invalid parameter \"{}\": {}", name, reason)
            }),
            Self::InvalidBody { message } => json!({
                "error": ErrorKind::Validation.as_str(),
                "message": format!("invalid request body: {}", message)
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Domain(e)
    }
}
