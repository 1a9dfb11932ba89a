//! User routes

use authgate_db::Role;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::info;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

use super::auth::{RequireAdmin, RequireAuth};
use super::types::{AssignRoleRequest, UserResponse};

/// GET /api/users/List (Admin only)
async fn list_users(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users_with_roles().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/users/MyProfile
async fn my_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state
        .db
        .get_user_with_roles(&user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(profile.into()))
}

/// POST /api/users/{id}/roles (Admin only)
async fn assign_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AssignRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role: Role = request.role.parse().map_err(|_| {
        ApiError::validation(
            "InvalidRoleName",
            format!("Role name '{}' is invalid.", request.role),
        )
    })?;

    state.db.add_user_to_role(&id, role).await?;

    let user = state
        .db
        .get_user_with_roles(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(
        "{} added user {} to role {}",
        admin.username, user.user.username, role
    );

    Ok(Json(user.into()))
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/List", get(list_users))
        .route("/api/users/MyProfile", get(my_profile))
        .route("/api/users/{id}/roles", post(assign_role))
}
