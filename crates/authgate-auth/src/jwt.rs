//! JWT token management

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthError;

/// Minimum signing secret length in bytes (HS256 key size)
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted access token lifetime, in minutes
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;

/// Longest accepted refresh token lifetime, in days
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// Number of random bytes in a refresh token
const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Username
    pub name: String,
    /// Unique token identifier
    pub jti: String,
    /// One entry per role membership
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Signing and lifetime settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    /// Defaults to the issuer when unset
    pub audience: Option<String>,
    pub validate_audience: bool,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
}

impl JwtConfig {
    /// Settings with the default lifetimes: 15 minute access tokens, 7 day refresh tokens
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: None,
            validate_audience: false,
            access_token_lifetime: Duration::minutes(15),
            refresh_token_lifetime: Duration::days(7),
        }
    }
}

/// Access token plus refresh token, each with its absolute expiry
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires: DateTime<Utc>,
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    validate_audience: bool,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
}

impl JwtManager {
    /// Create a new JWT manager
    ///
    /// Fails with [`AuthError::Configuration`] when the secret is shorter than
    /// [`MIN_SECRET_BYTES`], the issuer is blank or a lifetime is not positive
    /// or exceeds [`MAX_ACCESS_TOKEN_MINUTES`] / [`MAX_REFRESH_TOKEN_DAYS`].
    pub fn new(config: JwtConfig) -> Result<Self, AuthError> {
        let secret_len = config.secret.as_bytes().len();
        if secret_len < MIN_SECRET_BYTES {
            return Err(AuthError::Configuration(format!(
                "JWT signing key must be at least {} bytes, got {}",
                MIN_SECRET_BYTES, secret_len
            )));
        }

        let issuer = config.issuer.trim();
        if issuer.is_empty() {
            return Err(AuthError::Configuration("JWT issuer must not be empty".to_string()));
        }

        if config.access_token_lifetime <= Duration::zero()
            || config.refresh_token_lifetime <= Duration::zero()
        {
            return Err(AuthError::Configuration(
                "Token lifetimes must be positive".to_string(),
            ));
        }
        if config.access_token_lifetime > Duration::minutes(MAX_ACCESS_TOKEN_MINUTES) {
            return Err(AuthError::Configuration(format!(
                "Access token lifetime must not exceed {} minutes",
                MAX_ACCESS_TOKEN_MINUTES
            )));
        }
        if config.refresh_token_lifetime > Duration::days(MAX_REFRESH_TOKEN_DAYS) {
            return Err(AuthError::Configuration(format!(
                "Refresh token lifetime must not exceed {} days",
                MAX_REFRESH_TOKEN_DAYS
            )));
        }

        let audience = match config.audience.as_deref().map(str::trim) {
            Some(aud) if !aud.is_empty() => aud.to_string(),
            _ => issuer.to_string(),
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: issuer.to_string(),
            audience,
            validate_audience: config.validate_audience,
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
        })
    }

    /// Issue an access/refresh token pair for a user
    pub fn issue_tokens(
        &self,
        user_id: &str,
        username: &str,
        roles: &[String],
    ) -> Result<TokenPair, AuthError> {
        self.issue_at(user_id, username, roles, Utc::now())
    }

    /// Issue a token pair as if the current time were `now`
    pub fn issue_at(
        &self,
        user_id: &str,
        username: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::InvalidIdentity("user id is empty".to_string()));
        }
        if username.is_empty() {
            return Err(AuthError::InvalidIdentity("username is empty".to_string()));
        }

        // Whole seconds, so the reported expiry matches the `exp` claim
        let now = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expiry = |lifetime: Duration| {
            now.checked_add_signed(lifetime).ok_or_else(|| {
                AuthError::Configuration(format!("Token expiry overflows the clock at {}", now))
            })
        };
        let access_token_expires = expiry(self.access_token_lifetime)?;
        let refresh_token_expires = expiry(self.refresh_token_lifetime)?;

        let claims = Claims {
            sub: user_id.to_string(),
            name: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: access_token_expires.timestamp(),
        };

        debug!("Issuing tokens for user: {}", username);

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(TokenPair {
            access_token,
            access_token_expires,
            refresh_token: generate_refresh_token(),
            refresh_token_expires,
        })
    }

    /// Validate a JWT token and return claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a JWT token against the clock value `now`
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the supplied clock
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        if self.validate_audience {
            validation.set_audience(&[&self.audience]);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        // Check expiration
        if now.timestamp() >= token_data.claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(token_data.claims)
    }
}

/// Generate an opaque refresh token: 32 bytes from the OS RNG, base64 encoded
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Hex SHA-256 of a refresh token, the form in which it is persisted
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
