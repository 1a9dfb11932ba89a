//! Health check endpoints

use axum::{Json, Router, routing::get};

use crate::state::AppState;

/// Liveness check
async fn health() -> Json<&'static str> {
    metrics::counter!("authgate_health_checks_total").increment(1);
    Json("Healthy")
}

/// Root banner
async fn index() -> String {
    format!("authgate v{} is running", env!("CARGO_PKG_VERSION"))
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}
