//! Well-known role name constants.
//!
//! These must match the CHECK constraint on `users.role` in the initial
//! migration.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Roles accepted when creating a team member.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_USER];

/// Elevated roles may change the privacy of any history entry.
pub fn is_elevated(role: &str) -> bool {
    role == ROLE_ADMIN
}
