//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Body message for 401 responses on protected routes
pub const UNAUTHORIZED_MESSAGE: &str = "You must be logged in to access this endpoint.";
/// Body message for 403 responses on protected routes
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this endpoint.";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Invalid credentials" }),
            ),
            AuthError::Configuration(_)
            | AuthError::InvalidIdentity(_)
            | AuthError::PasswordHash(_) => {
                tracing::error!("Authentication internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            _ => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "message": UNAUTHORIZED_MESSAGE }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
