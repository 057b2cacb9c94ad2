//! User entity model and DTOs.

use phasetrack_core::scope::UserRecord;
use phasetrack_core::types::{DbId, Timestamp};
use phasetrack_core::viewer::Viewer;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub factory: Option<String>,
    pub client_company_name: Option<String>,
    pub color: Option<String>,
    pub font_color: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// The request-scoped identity used by every permission check.
    pub fn to_viewer(&self) -> Viewer {
        Viewer {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
            factory: self.factory.clone(),
            client_company_name: self.client_company_name.clone(),
        }
    }
}

impl UserRecord for User {
    fn user_id(&self) -> DbId {
        self.id
    }
    fn factory(&self) -> Option<&str> {
        self.factory.as_deref()
    }
    fn client_company_name(&self) -> Option<&str> {
        self.client_company_name.as_deref()
    }
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub factory: Option<String>,
    pub client_company_name: Option<String>,
    pub color: Option<String>,
    pub font_color: Option<String>,
    pub created_at: Timestamp,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            factory: user.factory,
            client_company_name: user.client_company_name,
            color: user.color,
            font_color: user.font_color,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user. `password_hash` is already hashed.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub factory: Option<String>,
    pub client_company_name: Option<String>,
    pub color: Option<String>,
    pub font_color: Option<String>,
}
