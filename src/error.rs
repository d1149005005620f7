//! 统一的 API 错误类型与转换。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use crate::assets::StoreError;

/// Message returned for every failed credential check, whatever the cause.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Missing marker or wrong password; the message goes to the client as is.
    Unauthorized(&'static str),
    /// Required secret is not configured. Logged, never described to the client.
    Misconfigured(&'static str),
    PayloadTooLarge,
    /// Storage provider failure: `(client message, upstream detail)`.
    Upstream(&'static str, String),
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, &msg),
            ApiError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, &msg),
            ApiError::Unauthorized(msg) => json_error(StatusCode::UNAUTHORIZED, msg),
            ApiError::Misconfigured(detail) => {
                error!(detail, "configuration fault");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, AUTH_FAILED_MESSAGE)
            }
            ApiError::PayloadTooLarge => {
                json_error(StatusCode::PAYLOAD_TOO_LARGE, "file exceeds upload limit")
            }
            ApiError::Upstream(msg, detail) => {
                error!(error = %detail, "{msg}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InvalidKey => ApiError::BadRequest("invalid file key".into()),
            other => ApiError::Upstream("Storage request failed", other.to_string()),
        }
    }
}

impl ApiError {
    /// Re-labels an upstream failure with an operation-specific client message.
    pub fn upstream_context(self, msg: &'static str) -> Self {
        match self {
            ApiError::Upstream(_, detail) => ApiError::Upstream(msg, detail),
            other => other,
        }
    }
}
