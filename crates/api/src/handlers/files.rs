//! Handlers for file metadata attached to history entries.
//!
//! Only metadata is stored. Locks are advisory: they block deletion of the
//! file and of its entry, and are released by the holder or an elevated role.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Page};
use phasetrack_core::types::DbId;
use phasetrack_db::models::project_file::{CreateProjectFile, ProjectFile};
use phasetrack_db::repositories::ProjectFileRepo;
use phasetrack_db::DbPool;

use crate::access::{require_action, visible_entry};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

fn file_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "ProjectFile",
        id,
    })
}

fn file_locked(file: &ProjectFile, fallback_holder: DbId) -> AppError {
    AppError::Core(CoreError::Locked {
        entity: "ProjectFile",
        id: file.id,
        locked_by: file.locked_by.unwrap_or(fallback_holder),
    })
}

async fn find_file(pool: &DbPool, entry_id: DbId, file_id: DbId) -> AppResult<ProjectFile> {
    ProjectFileRepo::find_for_entry(pool, entry_id, file_id)
        .await?
        .ok_or_else(|| file_not_found(file_id))
}

/// GET /api/v1/projects/{id}/history/{entryId}/files
pub async fn list(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Vec<ProjectFile>>>> {
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    let files = ProjectFileRepo::list_for_entry(&state.pool, entry_id).await?;
    Ok(Json(DataResponse { data: files }))
}

/// POST /api/v1/projects/{id}/history/{entryId}/files
pub async fn create(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
    Json(input): Json<CreateProjectFile>,
) -> AppResult<(StatusCode, Json<DataResponse<ProjectFile>>)> {
    require_action(&state.pool, &viewer, Page::Tasks, Action::Update).await?;
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    if input.filename.trim().is_empty() || input.filepath.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "filename and filepath are required".into(),
        )));
    }

    let file = ProjectFileRepo::create(&state.pool, project_id, entry_id, viewer.id, &input).await?;
    tracing::info!(file_id = file.id, entry_id, user_id = viewer.id, "File attached");
    Ok((StatusCode::CREATED, Json(DataResponse { data: file })))
}

/// PUT /api/v1/projects/{id}/history/{entryId}/files/{fileId}/lock
pub async fn lock(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id, file_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<Json<DataResponse<ProjectFile>>> {
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    find_file(&state.pool, entry_id, file_id).await?;

    match ProjectFileRepo::lock(&state.pool, file_id, viewer.id).await? {
        Some(file) => {
            tracing::info!(file_id, user_id = viewer.id, "File locked");
            Ok(Json(DataResponse { data: file }))
        }
        None => {
            let file = find_file(&state.pool, entry_id, file_id).await?;
            Err(file_locked(&file, viewer.id))
        }
    }
}

/// DELETE /api/v1/projects/{id}/history/{entryId}/files/{fileId}/lock
pub async fn unlock(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id, file_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<Json<DataResponse<ProjectFile>>> {
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    find_file(&state.pool, entry_id, file_id).await?;

    let force = viewer.is_elevated();
    match ProjectFileRepo::unlock(&state.pool, file_id, viewer.id, force).await? {
        Some(file) => {
            tracing::info!(file_id, user_id = viewer.id, force, "File unlocked");
            Ok(Json(DataResponse { data: file }))
        }
        None => {
            let file = find_file(&state.pool, entry_id, file_id).await?;
            Err(file_locked(&file, viewer.id))
        }
    }
}

/// DELETE /api/v1/projects/{id}/history/{entryId}/files/{fileId}
pub async fn delete(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id, file_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<StatusCode> {
    require_action(&state.pool, &viewer, Page::Tasks, Action::Delete).await?;
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    let file = find_file(&state.pool, entry_id, file_id).await?;
    if file.locked_by.is_some() {
        return Err(file_locked(&file, viewer.id));
    }

    if ProjectFileRepo::delete_unlocked(&state.pool, file_id).await? {
        tracing::info!(file_id, entry_id, user_id = viewer.id, "File deleted");
        return Ok(StatusCode::NO_CONTENT);
    }

    // Locked or removed since the check above.
    let file = find_file(&state.pool, entry_id, file_id).await?;
    Err(file_locked(&file, viewer.id))
}
