//! Team member endpoints and the per-user grant matrix.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_auth, get_auth, grant, grant_read, grant_switch, post_json,
    post_json_auth, put_json_auth, seed_named, seed_project, seed_user, token_for, UserSpec,
};
use phasetrack_db::models::user::User;
use serde_json::{json, Value};
use sqlx::PgPool;

async fn seed_admin(pool: &PgPool) -> User {
    seed_user(
        pool,
        UserSpec {
            name: "Root",
            role: Some("admin"),
            ..Default::default()
        },
    )
    .await
}

async fn get_matrix(pool: &PgPool, caller: &User, target: i64) -> (StatusCode, Value) {
    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/team-members/{target}/crud-permissions"),
        &token_for(caller),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn put_matrix(pool: &PgPool, caller: &User, target: i64, body: Value) -> (StatusCode, Value) {
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/team-members/{target}/crud-permissions"),
        &token_for(caller),
        body,
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_never_exposes_password_hashes(pool: PgPool) {
    let viewer = seed_named(&pool, "Lead").await;
    seed_named(&pool, "Member").await;
    grant_read(&pool, viewer.id, "Users", "all").await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/team-members", &token_for(&viewer)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("password_hash").is_none());
        assert!(user.get("password").is_none());
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn own_factory_scope_includes_users_assigned_there(pool: PgPool) {
    let lead = seed_user(
        &pool,
        UserSpec {
            name: "Lead",
            factory: Some("F1"),
            ..Default::default()
        },
    )
    .await;
    let colleague = seed_user(
        &pool,
        UserSpec {
            name: "Colleague",
            factory: Some("F1"),
            ..Default::default()
        },
    )
    .await;
    let visitor = seed_user(
        &pool,
        UserSpec {
            name: "Visitor",
            factory: Some("F9"),
            ..Default::default()
        },
    )
    .await;
    let _stranger = seed_user(
        &pool,
        UserSpec {
            name: "Stranger",
            factory: Some("F9"),
            ..Default::default()
        },
    )
    .await;
    grant_read(&pool, lead.id, "Users", "own-factory").await;

    let project = seed_project(&pool, lead.id, Some("F1"), None).await;
    sqlx::query(
        "INSERT INTO history_entries (project_id, entry_date, phase, assigned_to, created_by)
         VALUES ($1, '2024-05-01', 'Sample', 'Visitor', $2)",
    )
    .bind(project)
    .bind(lead.id)
    .execute(&pool)
    .await
    .unwrap();

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/team-members", &token_for(&lead)).await;

    let json = body_json(response).await;
    let mut ids: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    let mut expected = vec![lead.id, colleague.id, visitor.id];
    expected.sort_unstable();
    assert_eq!(ids, expected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn created_member_can_log_in(pool: PgPool) {
    let admin = seed_admin(&pool).await;
    grant_switch(&pool, admin.id, "Users", "create").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/team-members",
        &token_for(&admin),
        json!({
            "name": "New Hire",
            "username": "newhire",
            "password": "welcome-aboard-1",
            "factory": "F1"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["role"], "user");
    assert!(json["data"].get("password_hash").is_none());

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/auth/login",
        json!({"username": "newhire", "password": "welcome-aboard-1"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_member_validates_input(pool: PgPool) {
    let admin = seed_admin(&pool).await;
    grant_switch(&pool, admin.id, "Users", "create").await;
    let token = token_for(&admin);

    for body in [
        json!({"name": "A", "username": "a", "password": "short"}),
        json!({"name": "A", "username": "a", "password": "long-enough-pw", "role": "superuser"}),
        json!({"name": " ", "username": "a", "password": "long-enough-pw"}),
    ] {
        let app = common::build_test_app(pool.clone());
        let response = post_json_auth(app, "/api/v1/team-members", &token, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/v1/team-members",
        &token,
        json!({"name": "Dup", "username": "root", "password": "long-enough-pw"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_member_needs_switch_and_removes_grants(pool: PgPool) {
    let lead = seed_named(&pool, "Lead").await;
    let member = seed_named(&pool, "Member").await;
    grant_read(&pool, member.id, "Projects", "all").await;
    let uri = format!("/api/v1/team-members/{}", member.id);

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &token_for(&lead)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_switch(&pool, lead.id, "Users", "delete").await;
    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &token_for(&lead)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_permissions WHERE user_id = $1")
            .bind(member.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn crud_matrix_requires_crud_visible(pool: PgPool) {
    let user = seed_named(&pool, "Curious").await;
    let target = seed_named(&pool, "Target").await;

    let (status, _) = get_matrix(&pool, &user, target.id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    grant(&pool, user.id, "CRUD", "read", json!({"enabled": true})).await;
    let (status, json) = get_matrix(&pool, &user, target.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], target.id);
    assert_eq!(json["data"]["crud"]["Projects"]["create"], false);
    assert_eq!(json["data"]["crud"]["Projects"]["read"], Value::Null);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn crud_matrix_put_replaces_every_grant(pool: PgPool) {
    let admin = seed_admin(&pool).await;
    let target = seed_named(&pool, "Target").await;
    grant_switch(&pool, target.id, "Users", "delete").await;

    let (status, json) = put_matrix(
        &pool,
        &admin,
        target.id,
        json!({"crud": {
            "Projects": {"create": true, "read": {"enabled": true, "scope": "own-client"}},
            "Tasks": {"read": {"enabled": true, "scope": "specific-users", "userIds": [admin.id]}},
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let crud = &json["data"]["crud"];
    assert_eq!(crud["Projects"]["create"], true);
    assert_eq!(crud["Projects"]["read"]["scope"], "own-client");
    assert_eq!(crud["Tasks"]["read"]["userIds"], json!([admin.id]));
    assert_eq!(crud["Users"]["delete"], false);

    let (_, json) = get_matrix(&pool, &admin, target.id).await;
    assert_eq!(json["data"]["crud"], *crud);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_matrix_leaves_existing_grants_untouched(pool: PgPool) {
    let admin = seed_admin(&pool).await;
    let target = seed_named(&pool, "Target").await;
    grant_switch(&pool, target.id, "Projects", "create").await;

    let (status, _) = put_matrix(
        &pool,
        &admin,
        target.id,
        json!({"crud": {
            "Projects": {"update": true},
            "Users": {"read": {"enabled": true, "scope": "user-projects", "userIds": []}},
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = get_matrix(&pool, &admin, target.id).await;
    assert_eq!(json["data"]["crud"]["Projects"]["create"], true);
    assert_eq!(json["data"]["crud"]["Projects"]["update"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn crud_matrix_for_missing_user_is_404(pool: PgPool) {
    let admin = seed_admin(&pool).await;

    let (status, _) = get_matrix(&pool, &admin, 424_242).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
