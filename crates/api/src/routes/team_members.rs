//! Route definitions for the `/team-members` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::{permissions, team_member};
use crate::state::AppState;

/// Routes mounted at `/team-members`.
///
/// ```text
/// GET    /                        -> list
/// POST   /                        -> create
/// DELETE /{id}                    -> delete
/// GET    /{id}/crud-permissions   -> permissions::get
/// PUT    /{id}/crud-permissions   -> permissions::put
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(team_member::list).post(team_member::create))
        .route("/{id}", delete(team_member::delete))
        .route(
            "/{id}/crud-permissions",
            get(permissions::get).put(permissions::put),
        )
}
