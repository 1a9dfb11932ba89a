//! Argon2 password hashing

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::OnceLock;

use crate::error::AuthError;

/// Hash a password with Argon2id and a random salt, returning the PHC string
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a PHC hash string
///
/// `Ok(false)` means the password does not match; `Err` means the stored
/// hash could not be parsed or verified at all.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHash(e.to_string())),
    }
}

/// Run one full verification against a throwaway hash
///
/// Called when a login names an unknown user so that the response takes as
/// long as a wrong-password attempt.
pub fn equalize_verification_time(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| hash_password("authgate-unknown-user").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
