pub mod auth;
pub mod health;
pub mod projects;
pub mod team_members;

use axum::routing::get;
use axum::Router;

use crate::handlers::me;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                                      login (public)
/// /me                                              current user + capabilities
/// /projects/...                                    projects, history, privacy, files
/// /team-members/...                                users and their grant matrix
/// ```
///
/// Every route except `/auth/login` requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .route("/me", get(me::me))
        .nest("/projects", projects::router())
        .nest("/team-members", team_members::router())
}
