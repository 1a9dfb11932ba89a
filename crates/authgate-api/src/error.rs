//! API error types

use authgate_auth::ValidationIssue;
use authgate_auth::error::{FORBIDDEN_MESSAGE, UNAUTHORIZED_MESSAGE};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] authgate_db::DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] authgate_auth::AuthError),
}

impl ApiError {
    /// Shorthand for a single-entry validation error
    pub fn validation(code: &'static str, description: impl Into<String>) -> Self {
        ApiError::Validation(vec![ValidationIssue::new(code, description)])
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("InvalidRequest", rejection.body_text())
    }
}

/// Generic 500 body; details stay in the log
pub(crate) fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, axum::Json(json!({ "message": message }))).into_response()
            }
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, axum::Json(json!({ "errors": errors }))).into_response()
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "error": "Unauthorized", "message": UNAUTHORIZED_MESSAGE })),
            )
                .into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                axum::Json(json!({ "error": "Forbidden", "message": FORBIDDEN_MESSAGE })),
            )
                .into_response(),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                internal_error()
            }
            ApiError::Database(e) => match e {
                authgate_db::DbError::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, axum::Json(json!({ "message": msg }))).into_response()
                }
                other => {
                    error!("Database error: {}", other);
                    internal_error()
                }
            },
            ApiError::Auth(e) => e.into_response(),
        }
    }
}
