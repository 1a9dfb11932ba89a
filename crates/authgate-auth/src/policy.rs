//! Role policy gate

use authgate_db::Role;

use crate::jwt::Claims;

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Identity is valid and satisfies the role requirement
    Allow,
    /// Identity is valid but holds none of the required roles (403)
    Forbid,
    /// No valid identity was presented (401)
    Challenge,
}

/// Decide whether `claims` may access an endpoint requiring any of `required`
///
/// An empty `required` list only demands a valid identity.
pub fn authorize(claims: Option<&Claims>, required: &[Role]) -> Decision {
    let Some(claims) = claims else {
        return Decision::Challenge;
    };

    if required.is_empty() || required.iter().any(|role| claims.has_role(role.as_str())) {
        Decision::Allow
    } else {
        Decision::Forbid
    }
}
