//! Startup provisioning

use anyhow::{Result, bail};
use authgate_auth::{hash_password, validate_email, validate_password, validate_username};
use authgate_db::{Database, NewUser, Role};
use tracing::{debug, info};

use crate::config::BootstrapAdminConfig;

/// Create the configured administrator unless that username already exists
///
/// Returns whether a user was created. The account must satisfy the same
/// username, email and password rules as a registration.
pub async fn bootstrap_admin(db: &Database, admin: &BootstrapAdminConfig) -> Result<bool> {
    if db.get_user_by_username(&admin.username).await?.is_some() {
        debug!("Bootstrap admin {} already exists", admin.username);
        return Ok(false);
    }

    let mut issues = validate_username(&admin.username);
    issues.extend(validate_email(&admin.email));
    issues.extend(validate_password(&admin.password));
    if !issues.is_empty() {
        let reasons: Vec<&str> = issues.iter().map(|i| i.description.as_str()).collect();
        bail!("bootstrap_admin is invalid: {}", reasons.join(" "));
    }

    let password_hash = hash_password(&admin.password)?;
    db.create_user_with_role(
        NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
        },
        Role::Admin,
    )
    .await?;

    info!("Created bootstrap admin user: {}", admin.username);
    Ok(true)
}
