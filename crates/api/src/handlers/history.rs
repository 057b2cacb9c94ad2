//! Handlers for `/projects/{id}/history`.
//!
//! Replies and forwards are written in two steps: the child row is inserted
//! with a pending marker, then the parent is completed in its own
//! transaction. A failure in the second step is reported in the 201 body as
//! a `parent_completion` outcome the caller can retry, and the background
//! sweep in [`crate::background::parent_completion`] picks up whatever is
//! left behind.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::history::{self, EntryFields, STATUS_COMPLETED, STATUS_IN_PROGRESS};
use phasetrack_core::lineage::{self, EntryKind, LinkHints, ParentRef};
use phasetrack_core::permission::{Action, Page};
use phasetrack_core::types::{DbId, EntryDate};
use phasetrack_core::viewer::Viewer;
use phasetrack_core::visibility;
use phasetrack_db::models::history_entry::{
    CreateHistoryEntry, HistoryEntry, HistoryEntryView, UpdateHistoryEntry,
};
use phasetrack_db::repositories::{EntryDeletion, HistoryRepo};
use phasetrack_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::access::{
    entry_visible, require_action, require_entry_owner, task_predicate, visible_entry,
    visible_project,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::query::HistoryListParams;
use crate::response::DataResponse;
use crate::state::AppState;

const HEADER_IS_REPLY: &str = "x-is-reply";
const HEADER_IS_FORWARD: &str = "x-is-forward";
const HEADER_PARENT_ID: &str = "x-parent-id";

/* --------------------------------------------------------------------------
Request and response types
-------------------------------------------------------------------------- */

/// Body of `POST /projects/{id}/history`.
#[derive(Debug, Deserialize)]
pub struct CreateHistoryRequest {
    pub entry_date: EntryDate,
    pub phase: String,
    #[serde(default)]
    pub description: String,
    pub assigned_to: Option<String>,
    /// Defaults to "In Progress".
    pub status: Option<String>,
    /// `is_reply`, `is_forward` and `parent_id`. Flags set here replace the
    /// `X-Is-*` headers, and `parent_id` replaces `X-Parent-Id`.
    #[serde(flatten)]
    pub link: LinkHints,
}

/// A history entry as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryResponse {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub kind: EntryKind,
    /// Description with legacy reply / forward markers removed.
    pub display_description: String,
    pub assignee_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_user_name: Option<String>,
}

impl HistoryEntryResponse {
    fn from_view(row: HistoryEntryView, include_user_name: bool) -> Self {
        let kind = row.entry.kind();
        let display_description = lineage::strip_legacy_markers(&row.entry.description);
        let (created_by_name, acting_user_name) = if include_user_name {
            (row.created_by_name, row.acting_user_name)
        } else {
            (None, None)
        };
        Self {
            entry: row.entry,
            kind,
            display_description,
            assignee_id: row.assignee_id,
            created_by_name,
            acting_user_name,
        }
    }
}

/// Body of `GET /projects/{id}/history`.
#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub entries: Vec<HistoryEntryResponse>,
    pub latest_per_phase: BTreeMap<String, HistoryEntryResponse>,
}

/// Result of the parent-completion step of a reply or forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParentCompletion {
    /// The parent is now Completed.
    Completed { parent_id: DbId },
    /// Nothing was pending, or the parent no longer exists.
    NotPending { parent_id: Option<DbId> },
    /// The step failed. The child exists and stays pending; `retry` is the
    /// URL to POST to.
    Failed {
        parent_id: DbId,
        error: String,
        retry: String,
    },
}

/// Body of a successful create.
#[derive(Debug, Serialize)]
pub struct CreatedHistoryEntry {
    pub entry: HistoryEntryResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_completion: Option<ParentCompletion>,
}

/* --------------------------------------------------------------------------
Helpers
-------------------------------------------------------------------------- */

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::BadRequest(format!("Header {name} is not valid text")))
        })
        .transpose()
}

fn header_flag(headers: &HeaderMap, name: &str) -> AppResult<Option<bool>> {
    let Some(text) = header_text(headers, name)? else {
        return Ok(None);
    };
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" | "" => Ok(Some(false)),
        _ => Err(AppError::BadRequest(format!(
            "Header {name} must be true or false"
        ))),
    }
}

/// Lineage hints carried by the `X-Is-Reply`, `X-Is-Forward` and
/// `X-Parent-Id` headers.
fn header_hints(headers: &HeaderMap) -> AppResult<LinkHints> {
    let parent_id = header_text(headers, HEADER_PARENT_ID)?
        .filter(|text| !text.is_empty())
        .map(|text| {
            text.parse::<DbId>().map_err(|_| {
                AppError::BadRequest(format!("Header {HEADER_PARENT_ID} must be an integer id"))
            })
        })
        .transpose()?;

    Ok(LinkHints {
        is_reply: header_flag(headers, HEADER_IS_REPLY)?,
        is_forward: header_flag(headers, HEADER_IS_FORWARD)?,
        parent_id,
    })
}

fn retry_url(project_id: DbId, entry_id: DbId) -> String {
    format!("/api/v1/projects/{project_id}/history/{entry_id}/complete-parent")
}

/// Run the parent-completion step for `child`, turning a failure into a
/// [`ParentCompletion::Failed`] outcome instead of an error.
async fn run_parent_completion(pool: &DbPool, child: &HistoryEntry) -> ParentCompletion {
    match HistoryRepo::complete_parent(pool, child.id).await {
        Ok(Some(parent)) => {
            tracing::info!(
                entry_id = child.id,
                parent_id = parent.id,
                "Parent entry completed"
            );
            ParentCompletion::Completed {
                parent_id: parent.id,
            }
        }
        Ok(None) => ParentCompletion::NotPending {
            parent_id: child.parent_id,
        },
        Err(e) => {
            tracing::warn!(
                entry_id = child.id,
                parent_id = ?child.parent_id,
                error = %e,
                "Parent completion failed, left pending for retry"
            );
            ParentCompletion::Failed {
                parent_id: child.parent_id.unwrap_or_default(),
                error: "The parent entry could not be marked Completed".to_string(),
                retry: retry_url(child.project_id, child.id),
            }
        }
    }
}

/// Reload an entry with its joins for a response.
async fn load_view(pool: &DbPool, project_id: DbId, entry_id: DbId) -> AppResult<HistoryEntryView> {
    HistoryRepo::find_view_in_project(pool, project_id, entry_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))
}

/// Resolve the parent of a new reply or forward. Missing parents, parents
/// in another project and parents hidden from the viewer are all dangling.
async fn resolve_parent(
    pool: &DbPool,
    viewer: &Viewer,
    project_id: DbId,
    parent_id: DbId,
) -> AppResult<HistoryEntryView> {
    let predicate = task_predicate(pool, viewer).await?;
    HistoryRepo::find_view_in_project(pool, project_id, parent_id)
        .await?
        .filter(|row| entry_visible(row, viewer, predicate.as_ref()))
        .ok_or(AppError::Core(CoreError::DanglingLineage { parent_id }))
}

/* --------------------------------------------------------------------------
Handlers
-------------------------------------------------------------------------- */

/// GET /api/v1/projects/{id}/history
pub async fn list(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(project_id): Path<DbId>,
    Query(params): Query<HistoryListParams>,
) -> AppResult<Json<DataResponse<HistoryListResponse>>> {
    visible_project(&state.pool, &viewer, project_id).await?;
    let predicate = task_predicate(&state.pool, &viewer).await?;
    let rows = HistoryRepo::list_for_project(&state.pool, project_id).await?;

    let listing = visibility::list_history(rows, &viewer, predicate.as_ref());
    let include = params.include_user_name;
    let data = HistoryListResponse {
        entries: listing
            .entries
            .into_iter()
            .map(|row| HistoryEntryResponse::from_view(row, include))
            .collect(),
        latest_per_phase: listing
            .latest_per_phase
            .into_iter()
            .map(|(phase, row)| (phase, HistoryEntryResponse::from_view(row, include)))
            .collect(),
    };
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/projects/{id}/history
///
/// Creates a plain entry, or a reply / forward when the body or the `X-*`
/// headers name a parent.
pub async fn create(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(project_id): Path<DbId>,
    headers: HeaderMap,
    Json(input): Json<CreateHistoryRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedHistoryEntry>>)> {
    visible_project(&state.pool, &viewer, project_id).await?;
    require_action(&state.pool, &viewer, Page::Tasks, Action::Create).await?;

    let link = lineage::reconcile_link(input.link, header_hints(&headers)?)?;
    let fields = EntryFields {
        phase: input.phase,
        description: input.description,
        assigned_to: input.assigned_to,
        status: input
            .status
            .unwrap_or_else(|| STATUS_IN_PROGRESS.to_string()),
    };
    history::validate_entry_fields(&fields)?;

    let mut draft = CreateHistoryEntry {
        project_id,
        entry_date: input.entry_date,
        phase: fields.phase,
        description: fields.description,
        assigned_to: fields.assigned_to,
        status: fields.status,
        created_by: Some(viewer.id),
        acting_user_id: Some(viewer.id),
        parent_id: None,
        is_reply: false,
        is_forward: false,
        author_chain: None,
    };

    let Some((kind, parent_id)) = link else {
        let entry = HistoryRepo::create(&state.pool, &draft).await?;
        tracing::info!(
            entry_id = entry.id,
            project_id,
            user_id = viewer.id,
            "History entry created"
        );
        let view = load_view(&state.pool, project_id, entry.id).await?;
        return Ok((
            StatusCode::CREATED,
            Json(DataResponse {
                data: CreatedHistoryEntry {
                    entry: HistoryEntryResponse::from_view(view, true),
                    parent_completion: None,
                },
            }),
        ));
    };

    let parent = resolve_parent(&state.pool, &viewer, project_id, parent_id).await?;
    let parent_ref = ParentRef {
        id: parent.entry.id,
        project_id: parent.entry.project_id,
        created_by: parent.entry.created_by,
    };
    let owner_name = parent.created_by_name.as_deref().unwrap_or(&viewer.name);
    let derived = lineage::derive_link(&parent_ref, kind, owner_name, &viewer);

    draft.created_by = derived.created_by.or(Some(viewer.id));
    draft.acting_user_id = Some(derived.acting_user_id);
    draft.parent_id = Some(derived.parent_id);
    draft.is_reply = derived.is_reply;
    draft.is_forward = derived.is_forward;
    draft.author_chain = Some(derived.author_chain);

    let child = HistoryRepo::create_linked(&state.pool, &draft).await?;
    tracing::info!(
        entry_id = child.id,
        parent_id,
        project_id,
        user_id = viewer.id,
        kind = %kind,
        "Linked history entry created"
    );

    let parent_completion = run_parent_completion(&state.pool, &child).await;
    let view = load_view(&state.pool, project_id, child.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedHistoryEntry {
                entry: HistoryEntryResponse::from_view(view, true),
                parent_completion: Some(parent_completion),
            },
        }),
    ))
}

/// POST /api/v1/projects/{id}/history/{entryId}/complete-parent
///
/// Retry the parent-completion step of a reply or forward.
pub async fn complete_parent(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<ParentCompletion>>> {
    let row = visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    if row.entry.acting_user_id != Some(viewer.id) {
        require_entry_owner(&viewer, &row)?;
    }

    let outcome = run_parent_completion(&state.pool, &row.entry).await;
    Ok(Json(DataResponse { data: outcome }))
}

/// PUT /api/v1/projects/{id}/history/{entryId}
pub async fn update(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateHistoryEntry>,
) -> AppResult<Json<DataResponse<HistoryEntryResponse>>> {
    require_action(&state.pool, &viewer, Page::Tasks, Action::Update).await?;
    let row = visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    require_entry_owner(&viewer, &row)?;

    // Validate the row as it will look after the edit.
    let current = &row.entry;
    history::validate_entry_fields(&EntryFields {
        phase: input.phase.clone().unwrap_or_else(|| current.phase.clone()),
        description: input
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone()),
        assigned_to: input.assigned_to.clone().or_else(|| current.assigned_to.clone()),
        status: input.status.clone().unwrap_or_else(|| current.status.clone()),
    })?;

    HistoryRepo::update(&state.pool, entry_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))?;
    tracing::info!(entry_id, project_id, user_id = viewer.id, "History entry updated");

    let view = load_view(&state.pool, project_id, entry_id).await?;
    Ok(Json(DataResponse {
        data: HistoryEntryResponse::from_view(view, true),
    }))
}

/// POST /api/v1/projects/{id}/history/{entryId}/complete
///
/// The "Set Completed" shortcut. Needs the Tasks update switch but not
/// ownership.
pub async fn complete(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<HistoryEntryResponse>>> {
    require_action(&state.pool, &viewer, Page::Tasks, Action::Update).await?;
    visible_entry(&state.pool, &viewer, project_id, entry_id).await?;

    HistoryRepo::set_status(&state.pool, entry_id, STATUS_COMPLETED)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        }))?;
    tracing::info!(entry_id, project_id, user_id = viewer.id, "History entry completed");

    let view = load_view(&state.pool, project_id, entry_id).await?;
    Ok(Json(DataResponse {
        data: HistoryEntryResponse::from_view(view, true),
    }))
}

/// DELETE /api/v1/projects/{id}/history/{entryId}
///
/// Removes the entry and its file metadata. Refused while any attached file
/// is locked.
pub async fn delete(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((project_id, entry_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    require_action(&state.pool, &viewer, Page::Tasks, Action::Delete).await?;
    let row = visible_entry(&state.pool, &viewer, project_id, entry_id).await?;
    require_entry_owner(&viewer, &row)?;

    match HistoryRepo::delete_unless_locked(&state.pool, entry_id).await? {
        EntryDeletion::Deleted => {
            tracing::info!(entry_id, project_id, user_id = viewer.id, "History entry deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        EntryDeletion::NotFound => Err(AppError::Core(CoreError::NotFound {
            entity: "HistoryEntry",
            id: entry_id,
        })),
        EntryDeletion::Locked { file_id, locked_by } => {
            tracing::info!(entry_id, file_id, locked_by, "Delete refused, file is locked");
            Err(AppError::Core(CoreError::Locked {
                entity: "ProjectFile",
                id: file_id,
                locked_by,
            }))
        }
    }
}
