use crate::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
}

/// Error response: `{"error": true, "message": ...}` with a non-2xx status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { message } => ApiError::new(StatusCode::BAD_REQUEST, message),
            Error::Encoding(e) => {
                error!(error = %e, "Failed to encode event payload");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Cannot marshal body to JSON",
                )
            }
            Error::Delivery { message } => ApiError::new(StatusCode::BAD_GATEWAY, message),
            other => {
                error!(error = %other, "Unexpected error handling request");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: true,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
