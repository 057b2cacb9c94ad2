//! Repository for the `user_permissions` table.
//!
//! Rows come back unparsed; [`PermissionRow::to_grant`] is the single place
//! stored payloads are turned into typed grants.

use phasetrack_core::permission::{Action, NewGrant, Page};
use phasetrack_core::types::DbId;
use sqlx::PgPool;

use crate::models::permission::PermissionRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, page, action, properties, created_at, updated_at";

/// Provides access to stored grants.
pub struct PermissionRepo;

impl PermissionRepo {
    /// The grant for `(user_id, page, action)`, if one is stored. Absence
    /// means denied.
    pub async fn get(
        pool: &PgPool,
        user_id: DbId,
        page: Page,
        action: Action,
    ) -> Result<Option<PermissionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_permissions
             WHERE user_id = $1 AND page = $2 AND action = $3"
        );
        sqlx::query_as::<_, PermissionRow>(&query)
            .bind(user_id)
            .bind(page.as_str())
            .bind(action.as_str())
            .fetch_optional(pool)
            .await
    }

    /// All grants of a user, ordered by page and action.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<PermissionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_permissions WHERE user_id = $1 ORDER BY page, action"
        );
        sqlx::query_as::<_, PermissionRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Replace every grant of a user in one transaction. Any failure rolls
    /// the whole set back, so the user never ends up half-updated.
    pub async fn replace_for_user(
        pool: &PgPool,
        user_id: DbId,
        grants: &[NewGrant],
    ) -> Result<Vec<PermissionRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO user_permissions (user_id, page, action, properties)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let mut rows = Vec::with_capacity(grants.len());
        for grant in grants {
            let row = sqlx::query_as::<_, PermissionRow>(&query)
                .bind(user_id)
                .bind(grant.page.as_str())
                .bind(grant.action.as_str())
                .bind(grant.properties.to_json_text(grant.page))
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }

        tx.commit().await?;
        tracing::debug!(user_id, count = rows.len(), "Replaced user permissions");
        Ok(rows)
    }
}
