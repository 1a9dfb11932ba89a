//! authgate REST API
//!
//! This crate provides the Axum-based HTTP API for authgate: registration,
//! login, token refresh, logout, password change and user administration.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use extract::ApiJson;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
