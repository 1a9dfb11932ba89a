//! authgate credential store
//!
//! This crate provides the identity store for authgate: users, roles,
//! role memberships and refresh-token records, persisted in SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;
