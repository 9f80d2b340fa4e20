#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use school_admin::authz::Role;
use school_admin::create_app;
use school_admin::db::SqliteStore;
use school_admin::jwt::JwtConfig;
use school_admin::models::user::{User, UserCreateRequest};
use school_admin::services::users;

pub const TEST_SECRET: &str = "test-secret";

/// A migrated temp database and the router on top of it. Keep the value
/// alive for the whole test; dropping it removes the database file.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", TEST_SECRET);
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Creates an account directly in storage and returns it with a token.
    pub async fn account(&self, name: &str, email: &str, role: Role) -> Result<(User, String)> {
        let store = SqliteStore::new(self.pool.clone());
        let user = users::create_user(
            &store,
            UserCreateRequest {
                name: Some(name.into()),
                email: Some(email.into()),
                password: Some("password123".into()),
                role: Some(role),
                ..Default::default()
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!("seeding {email} failed: {err}"))?;

        let token = token_for(&user)?;
        Ok((user, token))
    }

    pub async fn admin(&self) -> Result<String> {
        let (_, token) = self.account("Admin", "admin@school.test", Role::Admin).await?;
        Ok(token)
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, value))
    }
}

impl TestApp {
    pub async fn login(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": "password123" })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login for {email} failed: {status} {body}");
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("missing token")
    }
}

pub fn token_for(user: &User) -> Result<String> {
    JwtConfig::new(TEST_SECRET, 1)
        .encode(&user.principal())
        .map_err(|err| anyhow::anyhow!("token signing failed: {err}"))
}

pub fn id_of(value: &Value) -> Result<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("missing id in {value}"))
}
