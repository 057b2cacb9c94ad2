//! Shared helpers for the API integration tests.
//!
//! Requests go straight through the router with `tower::ServiceExt`, no TCP
//! listener. Tokens are minted directly with the test JWT config; the login
//! flow itself is covered in `auth_api.rs`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use phasetrack_api::auth::jwt::{issue_access_token, JwtConfig};
use phasetrack_api::auth::password::hash_new_password;
use phasetrack_api::config::ServerConfig;
use phasetrack_api::router::build_app_router;
use phasetrack_api::state::AppState;
use phasetrack_db::models::project::CreateProject;
use phasetrack_db::models::user::{CreateUser, User};
use phasetrack_db::repositories::{ProjectRepo, UserRepo};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

/// Password given to every seeded user.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        parent_sweep_interval_secs: 60,
        parent_sweep_min_age_secs: 0,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// The production router over `pool`.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Profile of a seeded user.
#[derive(Debug, Clone, Default)]
pub struct UserSpec<'a> {
    pub name: &'a str,
    pub role: Option<&'a str>,
    pub factory: Option<&'a str>,
    pub client: Option<&'a str>,
}

pub async fn seed_user(pool: &PgPool, profile: UserSpec<'_>) -> User {
    let input = CreateUser {
        name: profile.name.to_string(),
        username: profile.name.to_lowercase(),
        email: None,
        password_hash: hash_new_password(TEST_PASSWORD).unwrap(),
        role: profile.role.unwrap_or("user").to_string(),
        factory: profile.factory.map(str::to_string),
        client_company_name: profile.client.map(str::to_string),
        color: None,
        font_color: None,
    };
    UserRepo::create(pool, &input).await.unwrap()
}

/// Seed a plain user with no factory or client.
pub async fn seed_named(pool: &PgPool, name: &str) -> User {
    seed_user(
        pool,
        UserSpec {
            name,
            ..Default::default()
        },
    )
    .await
}

pub fn token_for(user: &User) -> String {
    issue_access_token(user.id, &test_config().jwt).unwrap()
}

/// Store one grant row verbatim, bypassing matrix validation so tests can
/// also plant broken grants.
pub async fn grant(pool: &PgPool, user_id: i64, page: &str, action: &str, properties: Value) {
    sqlx::query(
        "INSERT INTO user_permissions (user_id, page, action, properties) VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(page)
    .bind(action)
    .bind(properties.to_string())
    .execute(pool)
    .await
    .unwrap();
}

/// Read grant with a scope.
pub async fn grant_read(pool: &PgPool, user_id: i64, page: &str, scope: &str) {
    grant(
        pool,
        user_id,
        page,
        "read",
        serde_json::json!({"enabled": true, "scope": scope}),
    )
    .await;
}

/// Create / update / delete switch.
pub async fn grant_switch(pool: &PgPool, user_id: i64, page: &str, action: &str) {
    grant(pool, user_id, page, action, serde_json::json!({"enabled": true})).await;
}

/// Everything a regular contributor needs to work on history entries of
/// every project.
pub async fn grant_contributor(pool: &PgPool, user_id: i64) {
    grant_read(pool, user_id, "Projects", "all").await;
    grant_read(pool, user_id, "Tasks", "all").await;
    for action in ["create", "update", "delete"] {
        grant_switch(pool, user_id, "Tasks", action).await;
    }
}

pub async fn seed_project(
    pool: &PgPool,
    created_by: i64,
    factory: Option<&str>,
    client: Option<&str>,
) -> i64 {
    let input = CreateProject {
        factory: factory.map(str::to_string),
        model_number: "MX-100".to_string(),
        factory_model_number: None,
        product_kind: None,
        client: client.map(str::to_string),
        start_date: None,
        end_date: None,
        status: None,
    };
    ProjectRepo::create(pool, &input, created_by).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Send a request with an optional bearer token, JSON body and extra
/// headers.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None, &[]).await
}

pub async fn post_json(app: Router, uri: &str, json: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(json), &[]).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None, &[]).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, json: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(json), &[]).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None, &[]).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, json: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(json), &[]).await
}

pub async fn put_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), None, &[]).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None, &[]).await
}
