//! Route definitions for the `/projects` resource and everything nested
//! under a project: history entries, their privacy and their files.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{files, history, privacy, project};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                                  -> list
/// POST   /                                                  -> create
/// GET    /{id}                                              -> get_by_id
/// PUT    /{id}                                              -> update
/// DELETE /{id}                                              -> delete
/// GET    /{id}/summary                                      -> summary
///
/// GET    /{id}/history                                      -> history::list
/// POST   /{id}/history                                      -> history::create
/// PUT    /{id}/history/{entry_id}                           -> history::update
/// DELETE /{id}/history/{entry_id}                           -> history::delete
/// POST   /{id}/history/{entry_id}/complete                  -> history::complete
/// POST   /{id}/history/{entry_id}/complete-parent           -> history::complete_parent
/// PUT    /{id}/history/{entry_id}/privacy                   -> privacy::set_privacy
/// GET    /{id}/history/{entry_id}/shared-users              -> privacy::shared_users
///
/// GET    /{id}/history/{entry_id}/files                     -> files::list
/// POST   /{id}/history/{entry_id}/files                     -> files::create
/// DELETE /{id}/history/{entry_id}/files/{file_id}           -> files::delete
/// PUT    /{id}/history/{entry_id}/files/{file_id}/lock      -> files::lock
/// DELETE /{id}/history/{entry_id}/files/{file_id}/lock      -> files::unlock
/// ```
pub fn router() -> Router<AppState> {
    let file_routes = Router::new()
        .route("/", get(files::list).post(files::create))
        .route("/{file_id}", axum::routing::delete(files::delete))
        .route("/{file_id}/lock", put(files::lock).delete(files::unlock));

    let history_routes = Router::new()
        .route("/", get(history::list).post(history::create))
        .route("/{entry_id}", put(history::update).delete(history::delete))
        .route("/{entry_id}/complete", post(history::complete))
        .route("/{entry_id}/complete-parent", post(history::complete_parent))
        .route("/{entry_id}/privacy", put(privacy::set_privacy))
        .route("/{entry_id}/shared-users", get(privacy::shared_users))
        .nest("/{entry_id}/files", file_routes);

    Router::new()
        .route("/", get(project::list).post(project::create))
        .route(
            "/{id}",
            get(project::get_by_id)
                .put(project::update)
                .delete(project::delete),
        )
        .route("/{id}/summary", get(project::summary))
        .nest("/{id}/history", history_routes)
}
