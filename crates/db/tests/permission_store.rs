//! Integration tests for stored grants: lookup, bulk replace and cascades.

use assert_matches::assert_matches;
use phasetrack_core::error::CoreError;
use phasetrack_core::permission::{Action, GrantProperties, NewGrant, Page, Scope};
use phasetrack_db::models::user::CreateUser;
use phasetrack_db::repositories::{PermissionRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, username: &str) -> i64 {
    let input = CreateUser {
        name: username.to_string(),
        username: username.to_string(),
        email: None,
        password_hash: "not-a-real-hash".to_string(),
        role: "user".to_string(),
        factory: None,
        client_company_name: None,
        color: None,
        font_color: None,
    };
    UserRepo::create(pool, &input).await.unwrap().id
}

fn scoped(page: Page, scope: Scope) -> NewGrant {
    NewGrant {
        page,
        action: Action::Read,
        properties: GrantProperties::Scoped {
            enabled: true,
            scope,
        },
    }
}

fn switch(page: Page, action: Action) -> NewGrant {
    NewGrant {
        page,
        action,
        properties: GrantProperties::Flag { enabled: true },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_absent_grant_is_none(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    let row = PermissionRepo::get(&pool, user_id, Page::Projects, Action::Read)
        .await
        .unwrap();
    assert!(row.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_stores_wire_shapes(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    let grants = vec![
        scoped(Page::Projects, Scope::OwnClient),
        scoped(Page::Users, Scope::SpecificUsers(vec![3, 4])),
        switch(Page::Tasks, Action::Create),
        switch(Page::Configuration, Action::Read),
    ];
    let rows = PermissionRepo::replace_for_user(&pool, user_id, &grants)
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);

    let config = PermissionRepo::get(&pool, user_id, Page::Configuration, Action::Read)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(config.properties, "true");

    let users = PermissionRepo::get(&pool, user_id, Page::Users, Action::Read)
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&users.properties).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"enabled": true, "scope": "specific-users", "userIds": [3, 4]})
    );
    let grant = users.to_grant().unwrap();
    assert_eq!(grant.properties.scope(), Some(&Scope::SpecificUsers(vec![3, 4])));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_removes_previous_grants(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    PermissionRepo::replace_for_user(&pool, user_id, &[scoped(Page::Projects, Scope::All)])
        .await
        .unwrap();
    PermissionRepo::replace_for_user(&pool, user_id, &[switch(Page::Tasks, Action::Update)])
        .await
        .unwrap();

    let rows = PermissionRepo::list_for_user(&pool, user_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].page, "Tasks");
    assert_eq!(rows[0].action, "update");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_replace_rolls_back(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    PermissionRepo::replace_for_user(&pool, user_id, &[scoped(Page::Projects, Scope::All)])
        .await
        .unwrap();

    // The same (page, action) twice violates the unique constraint halfway.
    let duplicate = vec![
        scoped(Page::Users, Scope::All),
        scoped(Page::Users, Scope::OwnFactory),
    ];
    let err = PermissionRepo::replace_for_user(&pool, user_id, &duplicate)
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("uq_user_permissions_user_page_action"));

    let rows = PermissionRepo::list_for_user(&pool, user_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].page, "Projects");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_stored_scope_fails_at_boundary(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    sqlx::query(
        "INSERT INTO user_permissions (user_id, page, action, properties)
         VALUES ($1, 'Tasks', 'read', '{\"enabled\":true,\"scope\":\"galaxy\"}')",
    )
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap();

    let row = PermissionRepo::get(&pool, user_id, Page::Tasks, Action::Read)
        .await
        .unwrap()
        .unwrap();
    assert_matches!(row.to_grant(), Err(CoreError::InvalidScope(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deleting_user_cascades_permissions(pool: PgPool) {
    let user_id = seed_user(&pool, "ann").await;
    PermissionRepo::replace_for_user(&pool, user_id, &[scoped(Page::Projects, Scope::All)])
        .await
        .unwrap();

    assert!(UserRepo::delete(&pool, user_id).await.unwrap());

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}
