//! Permission checks shared by handlers.
//!
//! Every check takes the request's [`Viewer`] explicitly. Grants are loaded
//! and parsed once per check through [`PermissionRepo`]; a grant that cannot
//! be parsed, or a list scope without ids, is a configuration error and
//! denies the request (logged as an error by [`AppError`]).

use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Grant, Page};
use phasetrack_core::privacy;
use phasetrack_core::scope::{
    self, AssignmentIndex, ProjectPredicate, TaskPredicate, UserPredicate,
};
use phasetrack_core::types::DbId;
use phasetrack_core::viewer::Viewer;
use phasetrack_db::models::history_entry::HistoryEntryView;
use phasetrack_db::models::project::Project;
use phasetrack_db::repositories::{HistoryRepo, PermissionRepo, ProjectRepo};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Load and parse the viewer's grant for `(page, action)`.
pub async fn load_grant(
    pool: &PgPool,
    viewer: &Viewer,
    page: Page,
    action: Action,
) -> AppResult<Option<Grant>> {
    let Some(row) = PermissionRepo::get(pool, viewer.id, page, action).await? else {
        return Ok(None);
    };
    let grant = row.to_grant()?;
    if grant.properties.scope().is_some_and(|s| s.is_misconfigured()) {
        return Err(CoreError::InvalidScope(format!(
            "{page} {action} grant for user {} has a list scope without userIds",
            viewer.id
        ))
        .into());
    }
    Ok(Some(grant))
}

/// Require a create / update / delete switch on `page`.
pub async fn require_action(
    pool: &PgPool,
    viewer: &Viewer,
    page: Page,
    action: Action,
) -> AppResult<()> {
    let grant = load_grant(pool, viewer, page, action).await?;
    if scope::action_allowed(grant.as_ref()) {
        Ok(())
    } else {
        Err(forbidden(viewer, page, action))
    }
}

fn forbidden(viewer: &Viewer, page: Page, action: Action) -> AppError {
    AppError::Core(CoreError::Forbidden(format!(
        "user {} lacks {page} {action}",
        viewer.id
    )))
}

/// The viewer's project read predicate. An always-false predicate is a
/// denial.
pub async fn project_predicate(pool: &PgPool, viewer: &Viewer) -> AppResult<ProjectPredicate> {
    let grant = load_grant(pool, viewer, Page::Projects, Action::Read).await?;
    let predicate = scope::resolve_project_predicate(grant.as_ref(), viewer)?;
    if predicate.0.is_nothing() {
        return Err(forbidden(viewer, Page::Projects, Action::Read));
    }
    Ok(predicate)
}

/// The viewer's team member read predicate. An always-false predicate is a
/// denial.
pub async fn user_predicate(pool: &PgPool, viewer: &Viewer) -> AppResult<UserPredicate> {
    let grant = load_grant(pool, viewer, Page::Users, Action::Read).await?;
    let predicate = scope::resolve_user_predicate(grant.as_ref(), viewer)?;
    if predicate.0.is_nothing() {
        return Err(forbidden(viewer, Page::Users, Action::Read));
    }
    Ok(predicate)
}

/// The viewer's task read predicate, or `None` when it admits nothing.
/// History lists are then empty rather than denied.
pub async fn task_predicate(pool: &PgPool, viewer: &Viewer) -> AppResult<Option<TaskPredicate>> {
    let grant = load_grant(pool, viewer, Page::Tasks, Action::Read).await?;
    let predicate = scope::resolve_task_predicate(grant.as_ref(), viewer)?;
    Ok((!predicate.0.is_nothing()).then_some(predicate))
}

/// User to project assignments, for predicates that join through tasks.
pub async fn assignment_index(pool: &PgPool) -> AppResult<AssignmentIndex> {
    let rows = HistoryRepo::list_assignments(pool).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Load a project the viewer may read. Missing and hidden projects are both
/// reported as not found.
pub async fn visible_project(
    pool: &PgPool,
    viewer: &Viewer,
    project_id: DbId,
) -> AppResult<Project> {
    let predicate = project_predicate(pool, viewer).await?;
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        })
    };
    let project = ProjectRepo::find_by_id(pool, project_id)
        .await?
        .ok_or_else(not_found)?;
    let index = assignment_index(pool).await?;
    if predicate.matches(&project, &index) {
        Ok(project)
    } else {
        Err(not_found())
    }
}

/// Whether a history row passes both the task scope and the privacy gate.
pub fn entry_visible(
    row: &HistoryEntryView,
    viewer: &Viewer,
    predicate: Option<&TaskPredicate>,
) -> bool {
    predicate.is_some_and(|p| p.matches(row))
        && privacy::is_visible(row.entry.private_by.as_deref(), viewer.id)
}

/// Load a history entry of a visible project that the viewer may see.
/// Missing and hidden entries are both reported as not found.
pub async fn visible_entry(
    pool: &PgPool,
    viewer: &Viewer,
    project_id: DbId,
    entry_id: DbId,
) -> AppResult<HistoryEntryView> {
    visible_project(pool, viewer, project_id).await?;
    let predicate = task_predicate(pool, viewer).await?;
    HistoryRepo::find_view_in_project(pool, project_id, entry_id)
        .await?
        .filter(|row| entry_visible(row, viewer, predicate.as_ref()))
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))
}

/// Editing or deleting an entry is reserved for its owner of record and
/// elevated roles.
pub fn require_entry_owner(viewer: &Viewer, row: &HistoryEntryView) -> AppResult<()> {
    if viewer.is_elevated() || row.entry.created_by == Some(viewer.id) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(format!(
            "user {} does not own history entry {}",
            viewer.id, row.entry.id
        ))))
    }
}
