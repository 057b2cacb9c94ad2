//! The request-scoped identity every core operation is evaluated against.

use serde::Serialize;

use crate::roles;
use crate::types::DbId;

/// Who is asking. Built once per request from the authenticated user row
/// and passed explicitly to every resolver and gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewer {
    pub id: DbId,
    /// Display name; history entries reference assignees by this value.
    pub name: String,
    pub username: String,
    pub role: String,
    /// Home factory, if any.
    pub factory: Option<String>,
    /// Home client company, if any.
    pub client_company_name: Option<String>,
}

impl Viewer {
    pub fn is_elevated(&self) -> bool {
        roles::is_elevated(&self.role)
    }
}
