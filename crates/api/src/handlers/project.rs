//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Page};
use phasetrack_core::types::DbId;
use phasetrack_core::visibility::{self, PhaseStatusSummary};
use phasetrack_db::models::project::{CreateProject, Project, UpdateProject};
use phasetrack_db::repositories::{HistoryRepo, ProjectRepo};
use serde::Serialize;

use crate::access::{assignment_index, project_predicate, require_action, visible_project};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

fn validate_model_number(model_number: &str) -> AppResult<()> {
    if model_number.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "model_number must not be blank".into(),
        )));
    }
    Ok(())
}

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    require_action(&state.pool, &viewer, Page::Projects, Action::Create).await?;
    validate_model_number(&input.model_number)?;

    let project = ProjectRepo::create(&state.pool, &input, viewer.id).await?;
    tracing::info!(project_id = project.id, user_id = viewer.id, "Project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
///
/// Only the projects the viewer's Projects read scope admits.
pub async fn list(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let predicate = project_predicate(&state.pool, &viewer).await?;
    let index = assignment_index(&state.pool).await?;
    let projects = ProjectRepo::list(&state.pool).await?;
    let projects = visibility::filter_projects(projects, &predicate, &index);
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = visible_project(&state.pool, &viewer, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProject>,
) -> AppResult<Json<DataResponse<Project>>> {
    visible_project(&state.pool, &viewer, id).await?;
    require_action(&state.pool, &viewer, Page::Projects, Action::Update).await?;
    if let Some(model_number) = &input.model_number {
        validate_model_number(model_number)?;
    }

    let project = ProjectRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    tracing::info!(project_id = id, user_id = viewer.id, "Project updated");
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/v1/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    visible_project(&state.pool, &viewer, id).await?;
    require_action(&state.pool, &viewer, Page::Projects, Action::Delete).await?;

    if ProjectRepo::delete(&state.pool, id).await? {
        tracing::info!(project_id = id, user_id = viewer.id, "Project deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))
    }
}

/// Body of `GET /projects/{id}/summary`.
#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub project: Project,
    #[serde(flatten)]
    pub status: PhaseStatusSummary,
}

/// GET /api/v1/projects/{id}/summary
///
/// Phase statuses are computed from every entry whose status the viewer may
/// see, independent of the history list filter.
pub async fn summary(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProjectSummary>>> {
    let project = visible_project(&state.pool, &viewer, id).await?;
    let rows = HistoryRepo::list_for_project(&state.pool, id).await?;
    let status = visibility::phase_status_summary(&rows, &viewer);
    Ok(Json(DataResponse {
        data: ProjectSummary { project, status },
    }))
}
