//! Handlers for entry privacy: `/projects/{id}/history/{entryId}/privacy`
//! and `/shared-users`.

use axum::extract::{Path, State};
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::privacy::{self, PrivacyState};
use phasetrack_core::types::DbId;
use phasetrack_core::viewer::Viewer;
use phasetrack_db::models::history_entry::HistoryEntryView;
use phasetrack_db::models::user::UserResponse;
use phasetrack_db::repositories::{HistoryRepo, UserRepo};
use phasetrack_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::access::{entry_visible, task_predicate, visible_entry, visible_project};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /privacy`.
#[derive(Debug, Deserialize)]
pub struct SetPrivacyRequest {
    pub private: bool,
    /// Users besides the owner who may still see a private entry.
    #[serde(default, alias = "sharedWith")]
    pub shared_with: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct PrivacyResponse {
    pub entry_id: DbId,
    pub privacy: PrivacyState,
}

/// Load the entry whose privacy is being changed. Elevated roles reach
/// entries hidden from them so they can repair or reassign privacy.
async fn entry_for_transition(
    pool: &DbPool,
    viewer: &Viewer,
    project_id: DbId,
    entry_id: DbId,
) -> AppResult<HistoryEntryView> {
    visible_project(pool, viewer, project_id).await?;
    let predicate = task_predicate(pool, viewer).await?;
    HistoryRepo::find_view_in_project(pool, project_id, entry_id)
        .await?
        .filter(|row| viewer.is_elevated() || entry_visible(row, viewer, predicate.as_ref()))
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))
}

/// Reject ids that do not reference an existing user.
async fn ensure_users_exist(pool: &DbPool, ids: &[DbId]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let existing = UserRepo::find_existing_ids(pool, ids).await?;
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !existing.contains(id))
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Validation(format!(
            "Unknown user ids: {}",
            missing.join(", ")
        ))))
    }
}

/// PUT /api/v1/projects/{id}/history/{entryId}/privacy
pub async fn set_privacy(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
    Json(input): Json<SetPrivacyRequest>,
) -> AppResult<Json<DataResponse<PrivacyResponse>>> {
    let row = entry_for_transition(&state.pool, &viewer, project_id, entry_id).await?;

    let current = match PrivacyState::parse(row.entry.private_by.as_deref()) {
        Ok(current) => current,
        Err(e) if viewer.is_elevated() => {
            tracing::warn!(entry_id, error = %e, "Overwriting malformed privacy state");
            PrivacyState::Public
        }
        Err(_) => return Err(CoreError::PrivacyUnauthorized { entry_id }.into()),
    };
    privacy::authorize_transition(entry_id, row.entry.created_by, &current, &viewer)?;

    let next = if input.private {
        let owner = current.owner().unwrap_or(viewer.id);
        PrivacyState::make_private(owner, input.shared_with)
    } else {
        PrivacyState::make_public()
    };
    ensure_users_exist(&state.pool, &next.referenced_users()).await?;

    let column = next.to_column();
    HistoryRepo::set_private_by(&state.pool, entry_id, column.as_deref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))?;

    tracing::info!(
        entry_id,
        user_id = viewer.id,
        private = input.private,
        "Entry privacy changed"
    );
    Ok(Json(DataResponse {
        data: PrivacyResponse {
            entry_id,
            privacy: next,
        },
    }))
}

/// GET /api/v1/projects/{id}/history/{entryId}/shared-users
pub async fn shared_users(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let row = visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    let current = PrivacyState::parse(row.entry.private_by.as_deref())?;

    let ids: Vec<DbId> = current
        .shared_with()
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return Ok(Json(DataResponse { data: Vec::new() }));
    }

    let users = UserRepo::list_by_ids(&state.pool, &ids).await?;
    Ok(Json(DataResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
    }))
}
