//! Authenticated principal

use authgate_db::Role;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::jwt::Claims;

/// Authenticated user information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            username: claims.name.clone(),
            roles: claims.roles.clone(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Bearer token carried by a request's `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    extract_bearer_token(header)
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}
