//! Handlers for the `/team-members` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Page};
use phasetrack_core::roles::{ROLE_USER, VALID_ROLES};
use phasetrack_core::types::DbId;
use phasetrack_core::visibility;
use phasetrack_db::models::user::{CreateUser, UserResponse};
use phasetrack_db::repositories::UserRepo;
use serde::Deserialize;

use crate::access::{assignment_index, require_action, user_predicate};
use crate::auth::password::hash_new_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /team-members`.
#[derive(Debug, Deserialize)]
pub struct CreateTeamMemberRequest {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    /// Defaults to "user".
    pub role: Option<String>,
    pub factory: Option<String>,
    pub client_company_name: Option<String>,
    pub color: Option<String>,
    pub font_color: Option<String>,
}

fn validation(msg: impl Into<String>) -> AppError {
    AppError::Core(CoreError::Validation(msg.into()))
}

/// GET /api/v1/team-members
pub async fn list(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let predicate = user_predicate(&state.pool, &viewer).await?;
    let index = assignment_index(&state.pool).await?;
    let users = UserRepo::list(&state.pool).await?;

    let members = visibility::filter_users(users, &predicate, &index)
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(DataResponse { data: members }))
}

/// POST /api/v1/team-members
pub async fn create(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Json(input): Json<CreateTeamMemberRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    require_action(&state.pool, &viewer, Page::Users, Action::Create).await?;

    if input.name.trim().is_empty() {
        return Err(validation("name must not be blank"));
    }
    if input.username.trim().is_empty() {
        return Err(validation("username must not be blank"));
    }
    let role = input.role.unwrap_or_else(|| ROLE_USER.to_string());
    if !VALID_ROLES.contains(&role.as_str()) {
        return Err(validation(format!(
            "Invalid role '{role}'. Must be one of: {}",
            VALID_ROLES.join(", ")
        )));
    }
    let password_hash = hash_new_password(&input.password)?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            name: input.name.trim().to_string(),
            username: input.username.trim().to_string(),
            email: input.email,
            password_hash,
            role,
            factory: input.factory,
            client_company_name: input.client_company_name,
            color: input.color,
            font_color: input.font_color,
        },
    )
    .await?;

    tracing::info!(new_user_id = user.id, user_id = viewer.id, "Team member created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: user.into() })))
}

/// DELETE /api/v1/team-members/{id}
///
/// Grants go with the user; entries keep existing with their owner cleared.
pub async fn delete(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    require_action(&state.pool, &viewer, Page::Users, Action::Delete).await?;
    if id == viewer.id {
        return Err(validation("You cannot delete your own account"));
    }

    if UserRepo::delete(&state.pool, id).await? {
        tracing::info!(deleted_user_id = id, user_id = viewer.id, "Team member deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "User", id }))
    }
}
