//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

impl DbError {
    /// Map a unique-constraint violation to `Duplicate`, anything else to `Connection`
    pub(crate) fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Duplicate(what.into()),
            _ => DbError::Connection(err),
        }
    }
}
