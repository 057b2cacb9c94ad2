//! Handlers for `/team-members/{id}/crud-permissions`, the per-user grant
//! matrix edited from the admin UI.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{self, Action, Page, PageMatrix, CRUD_VISIBLE};
use phasetrack_core::scope;
use phasetrack_core::types::DbId;
use phasetrack_core::viewer::Viewer;
use phasetrack_db::models::permission::PermissionRow;
use phasetrack_db::repositories::{PermissionRepo, UserRepo};
use phasetrack_db::DbPool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::load_grant;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

/// One page of the rendered matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMatrixView {
    pub create: bool,
    /// The stored read payload, `null` when no read grant exists.
    pub read: Option<Value>,
    pub update: bool,
    pub delete: bool,
}

/// `{ "crud": { "<Page>": { create, read, update, delete } } }`
#[derive(Debug, Serialize)]
pub struct CrudMatrixResponse {
    pub user_id: DbId,
    pub crud: BTreeMap<String, PageMatrixView>,
}

/// Body of `PUT /crud-permissions`. Pages left out lose all their grants.
#[derive(Debug, Deserialize)]
pub struct CrudMatrixRequest {
    #[serde(default)]
    pub crud: BTreeMap<String, PageMatrix>,
}

/// Editing grants needs the CRUD_VISIBLE gate, or an elevated role.
async fn require_crud_visible(pool: &DbPool, viewer: &Viewer) -> AppResult<()> {
    if viewer.is_elevated() {
        return Ok(());
    }
    let grant = load_grant(pool, viewer, CRUD_VISIBLE, Action::Read).await?;
    if scope::crud_visible(grant.as_ref()) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(format!(
            "user {} cannot manage permissions",
            viewer.id
        ))))
    }
}

async fn require_user(pool: &DbPool, id: DbId) -> AppResult<()> {
    UserRepo::find_by_id(pool, id)
        .await?
        .map(|_| ())
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// Render stored rows as the full matrix. Rows that no longer parse are
/// left out and logged.
fn render_matrix(user_id: DbId, rows: &[PermissionRow]) -> CrudMatrixResponse {
    let mut crud: BTreeMap<String, PageMatrixView> = Page::ALL
        .iter()
        .map(|page| (page.as_str().to_string(), PageMatrixView::default()))
        .collect();

    for row in rows {
        let grant = match row.to_grant() {
            Ok(grant) => grant,
            Err(e) => {
                tracing::error!(
                    permission_id = row.id,
                    user_id,
                    error = %e,
                    "Skipping unreadable grant"
                );
                continue;
            }
        };
        let view = crud.entry(grant.page.as_str().to_string()).or_default();
        match grant.action {
            Action::Create => view.create = grant.enabled(),
            Action::Update => view.update = grant.enabled(),
            Action::Delete => view.delete = grant.enabled(),
            Action::Read => view.read = Some(grant.properties.to_value(grant.page)),
        }
    }

    CrudMatrixResponse { user_id, crud }
}

/// GET /api/v1/team-members/{id}/crud-permissions
pub async fn get(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CrudMatrixResponse>>> {
    require_crud_visible(&state.pool, &viewer).await?;
    require_user(&state.pool, user_id).await?;

    let rows = PermissionRepo::list_for_user(&state.pool, user_id).await?;
    Ok(Json(DataResponse {
        data: render_matrix(user_id, &rows),
    }))
}

/// PUT /api/v1/team-members/{id}/crud-permissions
///
/// Replaces every grant of the user in one transaction.
pub async fn put(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(user_id): Path<DbId>,
    Json(input): Json<CrudMatrixRequest>,
) -> AppResult<Json<DataResponse<CrudMatrixResponse>>> {
    require_crud_visible(&state.pool, &viewer).await?;
    require_user(&state.pool, user_id).await?;

    let grants =
        permission::grants_from_matrix(input.crud.iter().map(|(page, m)| (page.as_str(), m)))?;
    let rows = PermissionRepo::replace_for_user(&state.pool, user_id, &grants).await?;

    tracing::info!(
        target_user_id = user_id,
        user_id = viewer.id,
        grants = rows.len(),
        "Permissions replaced"
    );
    Ok(Json(DataResponse {
        data: render_matrix(user_id, &rows),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn row(id: DbId, page: &str, action: &str, properties: &str) -> PermissionRow {
        PermissionRow {
            id,
            user_id: 5,
            page: page.to_string(),
            action: action.to_string(),
            properties: properties.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_matrix_lists_every_page() {
        let matrix = render_matrix(5, &[]);
        assert_eq!(matrix.crud.len(), Page::ALL.len());
        assert!(matrix.crud.values().all(|v| *v == PageMatrixView::default()));
    }

    #[test]
    fn test_render_matrix_skips_broken_rows() {
        let rows = vec![
            row(1, "Projects", "create", r#"{"enabled":true}"#),
            row(2, "Projects", "read", r#"{"enabled":true,"scope":"own-factory"}"#),
            row(3, "Users", "read", "not json"),
        ];
        let matrix = render_matrix(5, &rows);

        let projects = &matrix.crud["Projects"];
        assert!(projects.create);
        assert_eq!(
            projects.read,
            Some(json!({"enabled": true, "scope": "own-factory"}))
        );
        assert_eq!(matrix.crud["Users"].read, None);
    }
}
