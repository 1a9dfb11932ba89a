//! API routes

mod auth;
mod health;
pub mod types;
mod users;

use axum::{Router, response::Response, routing::get};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::error::internal_error;
use crate::state::{AppState, MetricsHandle};

pub use auth::{MaybeAuth, RequireAdmin, RequireAuth, registration_role};

/// Convert a handler panic into the generic 500 body
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!("Unhandled panic while processing request: {}", detail);
    internal_error()
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<MetricsHandle>) -> Router {
    let mut router = Router::new()
        // Liveness and banner
        .merge(health::routes())
        // Registration, login, tokens, passwords
        .merge(auth::routes())
        // Profiles and administration
        .merge(users::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    with_panic_guard(router)
}

/// Answer handler panics with the generic 500 body
fn with_panic_guard(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}
