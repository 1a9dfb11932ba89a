//! Configuration loading and validation

use anyhow::{Context, Result, bail};
use authgate_auth::JwtConfig;
use authgate_auth::jwt::{MAX_ACCESS_TOKEN_MINUTES, MAX_REFRESH_TOKEN_DAYS, MIN_SECRET_BYTES};
use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix; nested keys use `__`, e.g. `AUTHGATE__JWT__KEY`
const ENV_PREFIX: &str = "AUTHGATE";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// Token signing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub validate_audience: bool,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
}

/// Registration policy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationConfig {
    /// Let anonymous callers register themselves as ADMIN
    #[serde(default)]
    pub allow_self_service_admin: bool,
}

/// Administrator created at startup when absent
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdminConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite:./data/authgate.db?mode=rwc".to_string()
}

fn default_access_token_minutes() -> i64 {
    15
}

fn default_refresh_token_days() -> i64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from an optional TOML file overlaid with
    /// `AUTHGATE__*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Toml).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<()> {
        let key_len = self.jwt.key.len();
        if key_len == 0 {
            bail!("jwt.key is not configured");
        }
        if key_len < MIN_SECRET_BYTES {
            bail!(
                "jwt.key must be at least {} bytes, got {}",
                MIN_SECRET_BYTES,
                key_len
            );
        }
        if self.jwt.issuer.trim().is_empty() {
            bail!("jwt.issuer is not configured");
        }
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.jwt.access_token_minutes) {
            bail!(
                "jwt.access_token_minutes must be between 1 and {}",
                MAX_ACCESS_TOKEN_MINUTES
            );
        }
        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&self.jwt.refresh_token_days) {
            bail!(
                "jwt.refresh_token_days must be between 1 and {}",
                MAX_REFRESH_TOKEN_DAYS
            );
        }
        if let Some(admin) = &self.bootstrap_admin
            && admin.username.trim().is_empty()
        {
            bail!("bootstrap_admin.username must not be empty");
        }
        Ok(())
    }

    /// Token settings in the form the signer expects
    pub fn to_jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt.key.clone(),
            issuer: self.jwt.issuer.clone(),
            audience: self.jwt.audience.clone(),
            validate_audience: self.jwt.validate_audience,
            access_token_lifetime: Duration::minutes(self.jwt.access_token_minutes),
            refresh_token_lifetime: Duration::days(self.jwt.refresh_token_days),
        }
    }
}

/// File backing a `sqlite:` URL, if any
pub fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}
