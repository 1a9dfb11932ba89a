//! Request/Response DTOs

use authgate_auth::TokenPair;
use authgate_db::UserWithRoles;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Register request
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "userName")]
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "userName")]
    pub username: String,
    pub password: String,
}

/// Refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Change password request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(alias = "userName")]
    pub username: String,
    pub current_password: String,
    pub new_password: String,
}

/// Plain `{message}` response
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Login and refresh response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub access_token: String,
    pub access_token_expires: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires: DateTime<Utc>,
}

impl LoginResponse {
    pub fn new(message: impl Into<String>, user_id: String, tokens: TokenPair) -> Self {
        Self {
            message: message.into(),
            user_id,
            access_token: tokens.access_token,
            access_token_expires: tokens.access_token_expires,
            refresh_token: tokens.refresh_token,
            refresh_token_expires: tokens.refresh_token_expires,
        }
    }
}

// ==================== User Types ====================

/// Assign role request
#[derive(Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

/// User with roles (without password)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<UserWithRoles> for UserResponse {
    fn from(u: UserWithRoles) -> Self {
        Self {
            id: u.user.id,
            username: u.user.username,
            email: u.user.email,
            roles: u.roles,
        }
    }
}
