//! Privacy transitions and what they hide.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, get_auth, grant_contributor, post_json_auth, put_json_auth, seed_named,
    seed_project, seed_user, token_for, UserSpec,
};
use phasetrack_db::models::user::User;
use serde_json::{json, Value};
use sqlx::PgPool;

struct Fixture {
    owner: User,
    friend: User,
    outsider: User,
    project: i64,
    entry: i64,
}

async fn fixture(pool: &PgPool) -> Fixture {
    let owner = seed_named(pool, "Owner").await;
    let friend = seed_named(pool, "Friend").await;
    let outsider = seed_named(pool, "Outsider").await;
    for user in [&owner, &friend, &outsider] {
        grant_contributor(pool, user.id).await;
    }
    let project = seed_project(pool, owner.id, Some("F1"), None).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/history"),
        &token_for(&owner),
        json!({"entry_date": "2024-04-01", "phase": "Costing", "description": "Quote v2"}),
    )
    .await;
    let entry = body_json(response).await["data"]["entry"]["id"].as_i64().unwrap();

    Fixture {
        owner,
        friend,
        outsider,
        project,
        entry,
    }
}

async fn set_privacy(
    pool: &PgPool,
    f: &Fixture,
    caller: &User,
    body: Value,
) -> (StatusCode, Value) {
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/projects/{}/history/{}/privacy", f.project, f.entry),
        &token_for(caller),
        body,
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn visible_ids(pool: &PgPool, f: &Fixture, viewer: &User) -> Vec<i64> {
    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{}/history", f.project),
        &token_for(viewer),
    )
    .await;
    body_json(response).await["data"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn private_entry_is_seen_by_owner_and_shared_users_only(pool: PgPool) {
    let f = fixture(&pool).await;

    let (status, json) = set_privacy(
        &pool,
        &f,
        &f.owner,
        json!({"private": true, "shared_with": [f.friend.id]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["privacy"]["state"], "private");
    assert_eq!(json["data"]["privacy"]["owner"], f.owner.id);

    assert_eq!(visible_ids(&pool, &f, &f.owner).await, vec![f.entry]);
    assert_eq!(visible_ids(&pool, &f, &f.friend).await, vec![f.entry]);
    assert!(visible_ids(&pool, &f, &f.outsider).await.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn camel_case_shared_with_is_accepted(pool: PgPool) {
    let f = fixture(&pool).await;

    let (status, _) = set_privacy(
        &pool,
        &f,
        &f.owner,
        json!({"private": true, "sharedWith": [f.friend.id]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible_ids(&pool, &f, &f.friend).await, vec![f.entry]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_owner_cannot_change_privacy(pool: PgPool) {
    let f = fixture(&pool).await;

    let (status, json) = set_privacy(&pool, &f, &f.outsider, json!({"private": true})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "PRIVACY_FORBIDDEN");

    set_privacy(&pool, &f, &f.owner, json!({"private": true, "shared_with": [f.friend.id]})).await;
    let (status, _) = set_privacy(&pool, &f, &f.friend, json!({"private": false})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn owner_can_make_the_entry_public_again(pool: PgPool) {
    let f = fixture(&pool).await;
    set_privacy(&pool, &f, &f.owner, json!({"private": true})).await;
    assert!(visible_ids(&pool, &f, &f.outsider).await.is_empty());

    let (status, json) = set_privacy(&pool, &f, &f.owner, json!({"private": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["privacy"]["state"], "public");
    assert_eq!(visible_ids(&pool, &f, &f.outsider).await, vec![f.entry]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_may_change_any_entrys_privacy(pool: PgPool) {
    let f = fixture(&pool).await;
    let admin = seed_user(
        &pool,
        UserSpec {
            name: "Root",
            role: Some("admin"),
            ..Default::default()
        },
    )
    .await;
    grant_contributor(&pool, admin.id).await;
    set_privacy(&pool, &f, &f.owner, json!({"private": true})).await;

    let (status, json) = set_privacy(&pool, &f, &admin, json!({"private": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["privacy"]["state"], "public");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sharing_with_unknown_users_is_rejected(pool: PgPool) {
    let f = fixture(&pool).await;

    let (status, json) = set_privacy(
        &pool,
        &f,
        &f.owner,
        json!({"private": true, "shared_with": [f.friend.id, 987_654]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    assert_eq!(visible_ids(&pool, &f, &f.outsider).await, vec![f.entry]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn shared_users_are_returned_without_secrets(pool: PgPool) {
    let f = fixture(&pool).await;
    set_privacy(&pool, &f, &f.owner, json!({"private": true, "shared_with": [f.friend.id]})).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{}/history/{}/shared-users", f.project, f.entry),
        &token_for(&f.owner),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], f.friend.id);
    assert!(users[0].get("password_hash").is_none());

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{}/history/{}/shared-users", f.project, f.entry),
        &token_for(&f.outsider),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_privacy_hides_the_entry_from_everyone(pool: PgPool) {
    let f = fixture(&pool).await;
    sqlx::query("UPDATE history_entries SET private_by = 'owner,??' WHERE id = $1")
        .bind(f.entry)
        .execute(&pool)
        .await
        .unwrap();

    assert!(visible_ids(&pool, &f, &f.owner).await.is_empty());
    assert!(visible_ids(&pool, &f, &f.outsider).await.is_empty());
}
