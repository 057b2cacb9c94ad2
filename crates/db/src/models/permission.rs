//! Stored permission grants.

use std::str::FromStr;

use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Grant, GrantProperties, Page};
use phasetrack_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_permissions` table, before parsing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PermissionRow {
    pub id: DbId,
    pub user_id: DbId,
    pub page: String,
    pub action: String,
    /// JSON text; see [`GrantProperties::parse`] for accepted shapes.
    pub properties: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PermissionRow {
    /// Parse the stored row into a typed grant.
    ///
    /// Anything unreadable in a stored grant is a configuration error and
    /// surfaces as [`CoreError::InvalidScope`], never as a default.
    pub fn to_grant(&self) -> Result<Grant, CoreError> {
        let page = Page::from_str(&self.page).map_err(|_| {
            CoreError::InvalidScope(format!(
                "permission {} names unknown page '{}'",
                self.id, self.page
            ))
        })?;
        let action = Action::from_str(&self.action).map_err(|_| {
            CoreError::InvalidScope(format!(
                "permission {} names unknown action '{}'",
                self.id, self.action
            ))
        })?;
        let properties = GrantProperties::parse(&self.properties)?;
        Ok(Grant {
            user_id: self.user_id,
            page,
            action,
            properties,
        })
    }
}
