//! Input policies for registration and password change
//!
//! Each check returns every rule the input violates rather than stopping at
//! the first one; the API returns the list to the caller unchanged.

use serde::Serialize;

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Characters allowed in a username besides ASCII letters and digits
const USERNAME_EXTRA_CHARS: &str = "-._@+";
/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 6;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;

/// A single rejected input rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub description: String,
}

impl ValidationIssue {
    pub fn new(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

/// Validate username format and length
pub fn validate_username(username: &str) -> Vec<ValidationIssue> {
    if username.is_empty() {
        return vec![ValidationIssue::new("InvalidUserName", "Username cannot be empty.")];
    }

    let mut issues = Vec::new();
    if username.len() > MAX_USERNAME_LENGTH {
        issues.push(ValidationIssue::new(
            "InvalidUserName",
            format!(
                "Username exceeds maximum length of {} characters.",
                MAX_USERNAME_LENGTH
            ),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || USERNAME_EXTRA_CHARS.contains(c))
    {
        issues.push(ValidationIssue::new(
            "InvalidUserName",
            format!(
                "Username '{}' is invalid, can only contain letters, digits or '{}'.",
                username, USERNAME_EXTRA_CHARS
            ),
        ));
    }
    issues
}

/// Validate email shape: one '@' with a non-empty local part and domain
pub fn validate_email(email: &str) -> Vec<ValidationIssue> {
    let valid = email.len() <= MAX_EMAIL_LENGTH
        && !email.chars().any(char::is_whitespace)
        && matches!(
            email.split_once('@'),
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );

    if valid {
        Vec::new()
    } else {
        vec![ValidationIssue::new(
            "InvalidEmail",
            format!("Email '{}' is invalid.", email),
        )]
    }
}

/// Validate a new password against the password policy
pub fn validate_password(password: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        issues.push(ValidationIssue::new(
            "PasswordTooShort",
            format!("Passwords must be at least {} characters.", MIN_PASSWORD_LENGTH),
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        issues.push(ValidationIssue::new(
            "PasswordTooLong",
            format!(
                "Passwords must not exceed {} characters.",
                MAX_PASSWORD_LENGTH
            ),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresDigit",
            "Passwords must have at least one digit ('0'-'9').",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresLower",
            "Passwords must have at least one lowercase ('a'-'z').",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresUpper",
            "Passwords must have at least one uppercase ('A'-'Z').",
        ));
    }

    issues
}
