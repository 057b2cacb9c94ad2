//! `GET /me`: who am I and what may I do.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, Grant, Page, CRUD_VISIBLE};
use phasetrack_core::scope;
use phasetrack_core::viewer::Viewer;
use serde::Serialize;
use sqlx::PgPool;

use crate::access::load_grant;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentViewer;
use crate::response::DataResponse;
use crate::state::AppState;

/// Page-level capabilities the UI uses to show or hide controls. Row
/// filtering still happens on every request.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// May open the permissions admin UI.
    pub crud_visible: bool,
    /// May open the configuration page.
    pub configuration: bool,
    /// `page -> action -> allowed`, for the row-scoped pages. Read is
    /// reported as the scope name (`null` when denied).
    pub pages: BTreeMap<&'static str, BTreeMap<&'static str, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Viewer,
    pub capabilities: Capabilities,
}

/// Like [`load_grant`], but a broken grant reports the capability as denied
/// instead of failing the whole response.
async fn grant_or_denied(
    pool: &PgPool,
    viewer: &Viewer,
    page: Page,
    action: Action,
) -> AppResult<Option<Grant>> {
    match load_grant(pool, viewer, page, action).await {
        Err(AppError::Core(CoreError::InvalidScope(msg))) => {
            tracing::error!(
                user_id = viewer.id,
                %page,
                %action,
                error = %msg,
                "Invalid grant reported as denied"
            );
            Ok(None)
        }
        other => other,
    }
}

/// GET /api/v1/me
pub async fn me(
    State(state): State<AppState>,
    CurrentViewer(viewer): CurrentViewer,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let crud = grant_or_denied(&state.pool, &viewer, CRUD_VISIBLE, Action::Read).await?;
    let configuration =
        grant_or_denied(&state.pool, &viewer, Page::Configuration, Action::Read).await?;

    let mut pages = BTreeMap::new();
    for page in Page::ALL.into_iter().filter(|p| p.is_row_scoped()) {
        let mut actions = BTreeMap::new();
        for action in Action::ALL {
            let grant = grant_or_denied(&state.pool, &viewer, page, action).await?;
            let value = match action {
                Action::Read => grant
                    .as_ref()
                    .filter(|g| g.enabled())
                    .and_then(|g| g.properties.scope())
                    .map(|s| serde_json::Value::from(s.name()))
                    .unwrap_or(serde_json::Value::Null),
                _ => serde_json::Value::from(scope::action_allowed(grant.as_ref())),
            };
            actions.insert(action.as_str(), value);
        }
        pages.insert(page.as_str(), actions);
    }

    let capabilities = Capabilities {
        crud_visible: viewer.is_elevated() || scope::crud_visible(crud.as_ref()),
        configuration: scope::configuration_allowed(configuration.as_ref()),
        pages,
    };
    Ok(Json(DataResponse {
        data: MeResponse {
            user: viewer,
            capabilities,
        },
    }))
}
