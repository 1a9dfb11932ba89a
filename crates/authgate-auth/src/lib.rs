//! authgate authentication and authorization
//!
//! This crate provides JWT issuance and validation, the role policy gate,
//! argon2 password hashing and the input policies applied on registration
//! and password change.

pub mod error;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod principal;
pub mod validation;

pub use error::AuthError;
pub use jwt::{Claims, JwtConfig, JwtManager, TokenPair, hash_refresh_token};
pub use password::{equalize_verification_time, hash_password, verify_password};
pub use policy::{Decision, authorize};
pub use principal::{AuthUser, bearer_token, extract_bearer_token};
pub use validation::{ValidationIssue, validate_email, validate_password, validate_username};
