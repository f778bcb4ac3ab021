//! HTTP error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Session API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    SessionFailed(String),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        Self::SessionFailed(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::SessionFailed(msg) => {
                tracing::error!(error = %msg, "session request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "session_failed", msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
