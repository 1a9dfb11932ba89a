//! End-to-end tests driving the router in-process

use std::sync::Arc;

use authgate_api::{AppState, create_router};
use authgate_auth::{JwtConfig, JwtManager, hash_password};
use authgate_db::{Database, NewUser, Role};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-signing-key-that-is-long-enough!";

async fn test_app(allow_self_service_admin: bool) -> (Router, AppState) {
    let db = Database::in_memory().await.unwrap();
    let jwt = Arc::new(JwtManager::new(JwtConfig::new(SECRET, "authgate-test")).unwrap());
    let state = AppState::new(db, jwt, allow_self_service_admin);
    (create_router(state.clone(), None), state)
}

fn post(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register(app: &Router, username: &str, password: &str, role: Option<&str>) -> (StatusCode, Value) {
    let mut body = json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": password,
    });
    if let Some(role) = role {
        body["role"] = json!(role);
    }
    send(app, post("/api/auth/register", body, None)).await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post(
            "/api/auth/login",
            json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

async fn access_token(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = login(app, username, password).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["accessToken"].as_str().unwrap().to_string()
}

async fn seed_admin(state: &AppState, username: &str, password: &str) -> String {
    let user = state
        .db
        .create_user_with_role(
            NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: hash_password(password).unwrap(),
            },
            Role::Admin,
        )
        .await
        .unwrap();
    user.id
}

fn error_codes(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_register_login_profile_scenario() {
    let (app, _) = test_app(false).await;

    let (status, body) = register(&app, "alice", "Passw0rd", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");

    let (status, body) = login(&app, "alice", "Passw0rd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged in successfully");
    let user_id = body["userID"].as_str().unwrap().to_string();
    let token = body["accessToken"].as_str().unwrap().to_string();
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    assert!(body["accessTokenExpires"].is_string());
    assert!(body["refreshTokenExpires"].is_string());

    let (status, body) = send(&app, get("/api/users/MyProfile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["roles"], json!(["USER"]));

    let (status, body) = send(&app, get("/api/users/MyProfile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(body["message"].is_string());

    let (status, body) = send(&app, get("/api/users/List", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn test_invalid_token_is_challenged() {
    let (app, _) = test_app(false).await;

    let (status, body) = send(&app, get("/api/users/MyProfile", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&app, get("/api/users/List", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_other_secret_is_challenged() {
    let (app, _) = test_app(false).await;
    let foreign = JwtManager::new(JwtConfig::new(
        "a-completely-different-signing-key!!",
        "authgate-test",
    ))
    .unwrap();
    let tokens = foreign
        .issue_tokens("someone", "mallory", &["ADMIN".to_string()])
        .unwrap();

    let (status, _) = send(&app, get("/api/users/List", Some(&tokens.access_token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;

    let (wrong_status, wrong_body) = login(&app, "alice", "Wrong0ne").await;
    let (unknown_status, unknown_body) = login(&app, "nobody", "Passw0rd").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_username_is_case_insensitive() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;

    let (status, _) = login(&app, "ALICE", "Passw0rd").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_admin_registration_refused() {
    let (app, state) = test_app(false).await;

    let (status, body) = register(&app, "mallory", "Passw0rd", Some("ADMIN")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    assert!(state.db.get_user_by_username("mallory").await.unwrap().is_none());
}

#[tokio::test]
async fn test_self_service_admin_registration_when_enabled() {
    let (app, state) = test_app(true).await;

    let (status, _) = register(&app, "root", "Passw0rd", Some("ADMIN")).await;
    assert_eq!(status, StatusCode::OK);

    let user = state.db.get_user_by_username("root").await.unwrap().unwrap();
    assert_eq!(state.db.get_user_roles(&user.id).await.unwrap(), vec!["ADMIN"]);
    assert_eq!(state.db.list_roles().await.unwrap(), vec!["ADMIN", "USER"]);

    let token = access_token(&app, "root", "Passw0rd").await;
    let (status, body) = send(&app, get("/api/users/List", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["username"], "root");
    assert_eq!(body[0]["roles"], json!(["ADMIN"]));
}

#[tokio::test]
async fn test_admin_can_register_admin() {
    let (app, state) = test_app(false).await;
    seed_admin(&state, "root", "Passw0rd").await;
    let token = access_token(&app, "root", "Passw0rd").await;

    let body = json!({
        "username": "bob",
        "email": "bob@example.com",
        "password": "Passw0rd",
        "role": "ADMIN",
    });
    let (status, _) = send(&app, post("/api/auth/register", body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let bob = state.db.get_user_by_username("bob").await.unwrap().unwrap();
    assert_eq!(state.db.get_user_roles(&bob.id).await.unwrap(), vec!["ADMIN"]);
}

#[tokio::test]
async fn test_unrecognized_role_defaults_to_user() {
    let (app, state) = test_app(false).await;

    let (status, _) = register(&app, "carol", "Passw0rd", Some("wizard")).await;
    assert_eq!(status, StatusCode::OK);

    let carol = state.db.get_user_by_username("carol").await.unwrap().unwrap();
    assert_eq!(state.db.get_user_roles(&carol.id).await.unwrap(), vec!["USER"]);
    assert_eq!(state.db.list_roles().await.unwrap(), vec!["ADMIN", "USER"]);
}

#[tokio::test]
async fn test_registration_validation_errors() {
    let (app, _) = test_app(false).await;

    let body = json!({ "username": "bad name", "email": "nope", "password": "abc" });
    let (status, body) = send(&app, post("/api/auth/register", body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_codes(&body),
        vec![
            "InvalidUserName",
            "InvalidEmail",
            "PasswordTooShort",
            "PasswordRequiresDigit",
            "PasswordRequiresUpper"
        ]
    );

    register(&app, "alice", "Passw0rd", None).await;
    let (status, body) = register(&app, "alice", "Passw0rd", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_codes(&body), vec!["DuplicateUserName"]);
}

#[tokio::test]
async fn test_missing_field_is_a_validation_error() {
    let (app, state) = test_app(false).await;

    let body = json!({ "username": "alice", "password": "Passw0rd" });
    let response = app
        .clone()
        .oneshot(post("/api/auth/register", body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error_codes(&body), vec!["InvalidRequest"]);
    assert!(body["errors"][0]["description"].as_str().unwrap().contains("email"));

    assert!(state.db.get_user_by_username("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let (app, _) = test_app(false).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_codes(&body), vec!["InvalidRequest"]);
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;
    let (_, session) = login(&app, "alice", "Passw0rd").await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let (status, body) = send(
        &app,
        post("/api/auth/refresh", json!({ "refreshToken": refresh_token }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userID"], session["userID"]);
    assert_ne!(body["refreshToken"], session["refreshToken"]);

    let new_access = body["accessToken"].as_str().unwrap();
    let (status, _) = send(&app, get("/api/users/MyProfile", Some(new_access))).await;
    assert_eq!(status, StatusCode::OK);

    // Old refresh token is single-use
    let (status, _) = send(
        &app,
        post("/api/auth/refresh", json!({ "refreshToken": refresh_token }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_refresh_token_rejected() {
    let (app, _) = test_app(false).await;
    let (status, _) = send(
        &app,
        post("/api/auth/refresh", json!({ "refreshToken": "bogus" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_refresh_tokens() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;
    let (_, session) = login(&app, "alice", "Passw0rd").await;
    let access = session["accessToken"].as_str().unwrap();
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let (status, _) = send(&app, post("/api/auth/logout", json!({}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, post("/api/auth/logout", json!({}), Some(access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    let (status, _) = send(
        &app,
        post("/api/auth/refresh", json!({ "refreshToken": refresh_token }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;
    register(&app, "bob", "Passw0rd", None).await;
    let token = access_token(&app, "alice", "Passw0rd").await;

    let change = |username: &str, current: &str, new: &str| {
        post(
            "/api/auth/change-password",
            json!({ "username": username, "currentPassword": current, "newPassword": new }),
            Some(&token),
        )
    };

    let (status, body) = send(&app, change("alice", "Wrong0ne", "N3wPassword")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_codes(&body), vec!["PasswordMismatch"]);

    let (status, body) = send(&app, change("alice", "Passw0rd", "weak")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_codes(&body).contains(&"PasswordTooShort".to_string()));

    let (status, _) = send(&app, change("bob", "Passw0rd", "N3wPassword")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Another user's name is refused the same way whether or not it exists
    let (status, _) = send(&app, change("nobody", "Passw0rd", "N3wPassword")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, change("alice", "Passw0rd", "N3wPassword")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password changed successfully");

    assert_eq!(login(&app, "alice", "Passw0rd").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "alice", "N3wPassword").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_matches_own_name_case_insensitively() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;
    let token = access_token(&app, "alice", "Passw0rd").await;

    let body = json!({
        "username": "ALICE",
        "currentPassword": "Passw0rd",
        "newPassword": "N3wPassword",
    });
    let (status, _) = send(&app, post("/api/auth/change-password", body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_change_password_for_unknown_user_is_not_found() {
    let (app, state) = test_app(false).await;
    seed_admin(&state, "root", "Passw0rd").await;
    let token = access_token(&app, "root", "Passw0rd").await;

    let body = json!({
        "username": "nobody",
        "currentPassword": "Passw0rd",
        "newPassword": "N3wPassword",
    });
    let (status, body) = send(&app, post("/api/auth/change-password", body, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_change_password_revokes_refresh_tokens() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;
    let (_, session) = login(&app, "alice", "Passw0rd").await;
    let access = session["accessToken"].as_str().unwrap();
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let body = json!({
        "username": "alice",
        "currentPassword": "Passw0rd",
        "newPassword": "N3wPassword",
    });
    let (status, _) = send(&app, post("/api/auth/change-password", body, Some(access))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post("/api/auth/refresh", json!({ "refreshToken": refresh_token }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_requires_authentication() {
    let (app, _) = test_app(false).await;
    register(&app, "alice", "Passw0rd", None).await;

    let body = json!({
        "username": "alice",
        "currentPassword": "Passw0rd",
        "newPassword": "N3wPassword",
    });
    let (status, _) = send(&app, post("/api/auth/change-password", body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assign_role() {
    let (app, state) = test_app(false).await;
    seed_admin(&state, "root", "Passw0rd").await;
    register(&app, "alice", "Passw0rd", None).await;
    let alice = state.db.get_user_by_username("alice").await.unwrap().unwrap();
    let admin_token = access_token(&app, "root", "Passw0rd").await;
    let alice_token = access_token(&app, "alice", "Passw0rd").await;
    let uri = format!("/api/users/{}/roles", alice.id);

    let (status, _) = send(&app, post(&uri, json!({ "role": "ADMIN" }), Some(&alice_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, post(&uri, json!({ "role": "wizard" }), Some(&admin_token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_codes(&body), vec!["InvalidRoleName"]);

    let (status, _) = send(
        &app,
        post("/api/users/missing/roles", json!({ "role": "ADMIN" }), Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, post(&uri, json!({ "role": "ADMIN" }), Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["ADMIN", "USER"]));

    // New role shows up in tokens issued afterwards
    let alice_token = access_token(&app, "alice", "Passw0rd").await;
    let (status, _) = send(&app, get("/api/users/List", Some(&alice_token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(false).await;

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Healthy"));

    let response = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
