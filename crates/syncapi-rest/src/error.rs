//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use syncapi_store::StoreError;
use thiserror::Error;

/// Message of every 404 response
pub const NOT_FOUND_MESSAGE: &str = "The requested component has not been found.";

/// Message of every 5xx response
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected response was received from the backend.";

/// Structured error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code
    pub status_code: u16,
    /// Canonical reason phrase
    pub error: String,
    /// Human readable detail
    pub message: String,
}

impl ErrorBody {
    /// Create a payload for `status`
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: message.into(),
        }
    }

    /// 400 payload
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 payload
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    /// 500 payload
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }
}

/// Request errors
///
/// Handlers return these with `?`; [`IntoResponse`] maps each one to its
/// status and payload, and logs server-side failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out of range input
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource does not exist
    #[error("not found")]
    NotFound,

    /// Store failure (acquisition, query, binding)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Response encoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Payload for this error
    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest(message) => ErrorBody::bad_request(message.clone()),
            ApiError::NotFound => ErrorBody::not_found(),
            ApiError::Store(_) | ApiError::Serialization(_) => ErrorBody::internal(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Error surfaced through a response body that is already streaming
///
/// The status line has been sent by the time one of these occurs, so the
/// only remedy is to abort the body.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Row production failed
    #[error("row stream failed: {0}")]
    Store(#[from] StoreError),

    /// Row encoding failed
    #[error("row encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener or connection failure
    #[error("failed to bind server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for server lifecycle operations
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ===== ErrorBody Tests =====

    #[test]
    fn test_error_body_shapes() {
        let body = serde_json::to_value(ErrorBody::not_found()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status_code": 404,
                "error": "Not Found",
                "message": "The requested component has not been found."
            })
        );

        let body = serde_json::to_value(ErrorBody::internal()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status_code": 500,
                "error": "Internal Server Error",
                "message": "An unexpected response was received from the backend."
            })
        );
    }

    #[test]
    fn test_error_body_bad_request() {
        let body = ErrorBody::bad_request("nope");
        assert_eq!(body.status_code, 400);
        assert_eq!(body.error, "Bad Request");
        assert_eq!(body.message, "nope");
    }

    // ===== ApiError Tests =====

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_details_never_leak() {
        let err = ApiError::from(StoreError::Query("relation \"tx\" does not exist".into()));
        assert_eq!(err.body(), ErrorBody::internal());
        assert!(err.to_string().contains("relation"));
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = ApiError::BadRequest("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: ServerError = io_err.into();
        assert!(matches!(err, ServerError::Bind(_)));
    }
}
