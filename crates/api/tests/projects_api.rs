//! Project endpoints: scoped listing, CRUD switches and the status summary.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_auth, get_auth, grant, grant_contributor, grant_read, grant_switch,
    post_json_auth, put_json_auth, seed_named, seed_project, seed_user, token_for, UserSpec,
};
use serde_json::json;
use sqlx::PgPool;

fn ids(json: &serde_json::Value) -> Vec<i64> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn own_client_scope_lists_only_that_clients_projects(pool: PgPool) {
    let owner = seed_named(&pool, "Owner").await;
    let viewer = seed_user(
        &pool,
        UserSpec {
            name: "Acme Buyer",
            client: Some("ACME"),
            ..Default::default()
        },
    )
    .await;
    grant_read(&pool, viewer.id, "Projects", "own-client").await;

    let acme = seed_project(&pool, owner.id, Some("F1"), Some("ACME")).await;
    let _other = seed_project(&pool, owner.id, Some("F1"), Some("Globex")).await;
    let _none = seed_project(&pool, owner.id, Some("F2"), None).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/projects", &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&body_json(response).await), vec![acme]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_without_read_grant_is_forbidden(pool: PgPool) {
    let viewer = seed_named(&pool, "Nobody").await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/projects", &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_scope_without_user_ids_is_denied(pool: PgPool) {
    let owner = seed_named(&pool, "Owner").await;
    let viewer = seed_named(&pool, "Misconfigured").await;
    grant(
        &pool,
        viewer.id,
        "Projects",
        "read",
        json!({"enabled": true, "scope": "user-projects", "userIds": []}),
    )
    .await;
    seed_project(&pool, owner.id, Some("F1"), Some("ACME")).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/projects", &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Permission denied");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_scope_name_is_denied(pool: PgPool) {
    let viewer = seed_named(&pool, "Typo").await;
    grant(
        &pool,
        viewer.id,
        "Projects",
        "read",
        json!({"enabled": true, "scope": "everything-please"}),
    )
    .await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/projects", &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hidden_project_reads_as_not_found(pool: PgPool) {
    let owner = seed_named(&pool, "Owner").await;
    let viewer = seed_user(
        &pool,
        UserSpec {
            name: "Factory Lead",
            factory: Some("F1"),
            ..Default::default()
        },
    )
    .await;
    grant_read(&pool, viewer.id, "Projects", "own-factory").await;
    let hidden = seed_project(&pool, owner.id, Some("F2"), None).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/projects/{hidden}"), &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_requires_the_create_switch(pool: PgPool) {
    let user = seed_named(&pool, "Planner").await;
    let body = json!({"model_number": "MX-200", "factory": "F1", "client": "ACME"});

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/projects", &token_for(&user), body.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_switch(&pool, user.id, "Projects", "create").await;
    let app = common::build_test_app(pool);
    let response = post_json_auth(app, "/api/v1/projects", &token_for(&user), body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["model_number"], "MX-200");
    assert_eq!(json["data"]["created_by"], user.id);
    assert_eq!(json["data"]["status"], "In Progress");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_model_number_is_rejected(pool: PgPool) {
    let user = seed_named(&pool, "Planner").await;
    grant_switch(&pool, user.id, "Projects", "create").await;

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        &token_for(&user),
        json!({"model_number": "   "}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_and_delete_need_their_switches(pool: PgPool) {
    let user = seed_named(&pool, "Planner").await;
    grant_read(&pool, user.id, "Projects", "all").await;
    let project = seed_project(&pool, user.id, Some("F1"), None).await;
    let uri = format!("/api/v1/projects/{project}");
    let token = token_for(&user);

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &uri, &token, json!({"status": "On Hold"})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_switch(&pool, user.id, "Projects", "update").await;
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &uri, &token, json!({"status": "On Hold"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "On Hold");

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_switch(&pool, user.id, "Projects", "delete").await;
    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = get_auth(app, &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn summary_ignores_statuses_of_private_entries(pool: PgPool) {
    let author = seed_named(&pool, "Author").await;
    let reader = seed_named(&pool, "Reader").await;
    grant_contributor(&pool, author.id).await;
    grant_read(&pool, reader.id, "Projects", "all").await;
    let project = seed_project(&pool, author.id, Some("F1"), None).await;
    let author_token = token_for(&author);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/history"),
        &author_token,
        json!({"entry_date": "2024-03-01", "phase": "Sample", "status": "In Progress"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/history"),
        &author_token,
        json!({"entry_date": "2024-03-05", "phase": "Sample", "status": "On Hold"}),
    )
    .await;
    let newest = body_json(response).await["data"]["entry"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/projects/{project}/history/{newest}/privacy"),
        &author_token,
        json!({"private": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/summary"),
        &token_for(&reader),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["active_status"], "In Progress");
    assert_eq!(data["phase_statuses"]["Sample"], "In Progress");

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/summary"),
        &author_token,
    )
    .await;
    let data = &body_json(response).await["data"];
    assert_eq!(data["active_status"], "On Hold");
}
