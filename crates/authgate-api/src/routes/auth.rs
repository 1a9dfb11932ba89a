//! Authentication extractors and routes

use authgate_auth::{
    AuthError, AuthUser, Claims, Decision, TokenPair, ValidationIssue, authorize, bearer_token,
    equalize_verification_time, hash_password, hash_refresh_token,
    validate_email, validate_password, validate_username, verify_password,
};
use authgate_db::{DbError, NewRefreshToken, NewUser, Role, User};
use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    routing::post,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

use super::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RefreshRequest,
    RegisterRequest,
};

// ==================== Auth Extractors ====================

/// Validate the bearer token on a request, if there is one
///
/// A malformed or rejected token yields `None`, the same as no token.
fn bearer_claims(parts: &Parts, state: &AppState) -> Option<Claims> {
    let token = match bearer_token(&parts.headers) {
        Ok(token) => token,
        Err(AuthError::MissingAuthHeader) => return None,
        Err(e) => {
            debug!("Rejected authorization header: {}", e);
            return None;
        }
    };

    match state.jwt.validate_token(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Run the role gate and turn its decision into a principal or a rejection
fn gate(claims: Option<Claims>, required: &[Role]) -> Result<AuthUser, ApiError> {
    match (authorize(claims.as_ref(), required), claims) {
        (Decision::Allow, Some(claims)) => Ok(AuthUser::from_claims(&claims)),
        (Decision::Forbid, _) => Err(ApiError::Forbidden),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Extractor for authenticated user (required)
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let user = gate(bearer_claims(parts, &app_state), &[])?;

        debug!("Authenticated user: {} ({:?})", user.username, user.roles);
        Ok(RequireAuth(user))
    }
}

/// Extractor for admin user (required)
pub struct RequireAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let user = gate(bearer_claims(parts, &app_state), &[Role::Admin])?;
        Ok(RequireAdmin(user))
    }
}

/// Extractor for an optional caller identity; never rejects
pub struct MaybeAuth(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let user = bearer_claims(parts, &app_state).map(|claims| AuthUser::from_claims(&claims));
        Ok(MaybeAuth(user))
    }
}

// ==================== Registration Policy ====================

/// Decide which role a new registration receives
///
/// `ADMIN` is only granted when the caller may elevate; anything other than
/// `ADMIN` falls back to `USER`.
pub fn registration_role(requested: Option<&str>, may_elevate: bool) -> Result<Role, ApiError> {
    match requested.and_then(|r| r.parse::<Role>().ok()) {
        Some(Role::Admin) if may_elevate => Ok(Role::Admin),
        Some(Role::Admin) => Err(ApiError::Forbidden),
        _ => Ok(Role::User),
    }
}

// ==================== Sessions ====================

/// Issue a token pair for `user` and persist the refresh token hash
async fn open_session(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let roles = state.db.get_user_roles(&user.id).await?;
    let tokens = state.jwt.issue_tokens(&user.id, &user.username, &roles)?;

    state
        .db
        .insert_refresh_token(NewRefreshToken {
            user_id: user.id.clone(),
            token_hash: hash_refresh_token(&tokens.refresh_token),
            expires_at: tokens.refresh_token_expires,
        })
        .await?;

    Ok(tokens)
}

// ==================== Auth Routes ====================

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("Registration requested for user: {}", request.username);

    let may_elevate =
        state.allow_self_service_admin || caller.as_ref().is_some_and(AuthUser::is_admin);
    let role = registration_role(request.role.as_deref(), may_elevate).inspect_err(|_| {
        warn!(
            "Refused ADMIN self-registration for user: {}",
            request.username
        );
    })?;

    let mut issues: Vec<ValidationIssue> = Vec::new();
    issues.extend(validate_username(&request.username));
    issues.extend(validate_email(&request.email));
    issues.extend(validate_password(&request.password));
    if !issues.is_empty() {
        debug!("Registration rejected for user: {}", request.username);
        return Err(ApiError::Validation(issues));
    }

    let password_hash = hash_password(&request.password)?;

    let user = state
        .db
        .create_user_with_role(
            NewUser {
                username: request.username.clone(),
                email: request.email.clone(),
                password_hash,
            },
            role,
        )
        .await
        .map_err(|e| match e {
            DbError::Duplicate(_) => ApiError::validation(
                "DuplicateUserName",
                format!("Username '{}' is already taken.", request.username),
            ),
            other => other.into(),
        })?;

    metrics::counter!("authgate_registrations_total", "role" => role.as_str()).increment(1);
    info!("Registered user {} with role {}", user.username, role);

    Ok(Json(MessageResponse::new("User registered successfully")))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    debug!("Login attempt for user: {}", request.username);

    // Always perform exactly one password verification so that unknown users
    // and wrong passwords take the same time
    let user = match state.db.get_user_by_username(&request.username).await? {
        Some(user) => verify_password(&request.password, &user.password_hash)?.then_some(user),
        None => {
            equalize_verification_time(&request.password);
            None
        }
    };

    let Some(user) = user else {
        metrics::counter!("authgate_logins_total", "outcome" => "failure").increment(1);
        warn!("Failed login for user: {}", request.username);
        return Err(AuthError::InvalidCredentials.into());
    };

    let tokens = open_session(&state, &user).await?;

    metrics::counter!("authgate_logins_total", "outcome" => "success").increment(1);
    info!("User {} logged in successfully", user.username);

    Ok(Json(LoginResponse::new("Logged in successfully", user.id, tokens)))
}

/// POST /api/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token_hash = hash_refresh_token(&request.refresh_token);

    let record = state
        .db
        .get_refresh_token_by_hash(&token_hash)
        .await?
        .filter(|t| t.is_active(Utc::now()));

    // Revoking first makes the token single-use even under concurrent exchanges
    let record = match record {
        Some(record) if state.db.revoke_refresh_token(record.id).await? => record,
        _ => {
            metrics::counter!("authgate_token_refreshes_total", "outcome" => "failure")
                .increment(1);
            return Err(AuthError::InvalidToken.into());
        }
    };

    let user = state
        .db
        .get_user_by_id(&record.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let tokens = open_session(&state, &user).await?;

    metrics::counter!("authgate_token_refreshes_total", "outcome" => "success").increment(1);
    debug!("Refreshed tokens for user: {}", user.username);

    Ok(Json(LoginResponse::new("Token refreshed successfully", user.id, tokens)))
}

/// POST /api/auth/logout
async fn logout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let revoked = state.db.revoke_user_refresh_tokens(&user.id).await?;
    info!("User {} logged out ({} refresh tokens revoked)", user.username, revoked);

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// POST /api/auth/change-password
async fn change_password(
    RequireAuth(caller): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Non-admins may only name themselves; checked before any lookup
    if !caller.is_admin() && !request.username.eq_ignore_ascii_case(&caller.username) {
        warn!(
            "User {} tried to change the password of {}",
            caller.username, request.username
        );
        return Err(ApiError::Forbidden);
    }

    let user = state
        .db
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.id != caller.id && !caller.is_admin() {
        warn!(
            "User {} tried to change the password of {}",
            caller.username, user.username
        );
        return Err(ApiError::Forbidden);
    }

    if !verify_password(&request.current_password, &user.password_hash)? {
        return Err(ApiError::validation("PasswordMismatch", "Incorrect password."));
    }

    let issues = validate_password(&request.new_password);
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }

    let password_hash = hash_password(&request.new_password)?;
    state.db.update_user_password(&user.id, &password_hash).await?;
    state.db.revoke_user_refresh_tokens(&user.id).await?;

    info!("Password changed for user: {}", user.username);

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/change-password", post(change_password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_role_defaults_to_user() {
        assert_eq!(registration_role(None, false).unwrap(), Role::User);
        assert_eq!(registration_role(Some("USER"), false).unwrap(), Role::User);
        assert_eq!(registration_role(Some("wizard"), false).unwrap(), Role::User);
        assert_eq!(registration_role(Some("wizard"), true).unwrap(), Role::User);
    }

    #[test]
    fn test_registration_role_admin_requires_elevation() {
        assert!(matches!(
            registration_role(Some("ADMIN"), false),
            Err(ApiError::Forbidden)
        ));
        assert_eq!(registration_role(Some("ADMIN"), true).unwrap(), Role::Admin);
        assert_eq!(registration_role(Some("admin"), true).unwrap(), Role::Admin);
    }

    fn claims_with(roles: &[&str]) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            name: "alice".to_string(),
            jti: "jti".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iss: "issuer".to_string(),
            aud: "issuer".to_string(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_gate_outcomes() {
        assert!(matches!(gate(None, &[]), Err(ApiError::Unauthorized)));
        assert!(matches!(
            gate(Some(claims_with(&["USER"])), &[Role::Admin]),
            Err(ApiError::Forbidden)
        ));

        let user = gate(Some(claims_with(&["ADMIN"])), &[Role::Admin]).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.is_admin());
    }
}
