//! Shared fixtures for the router integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Duration;
use perch_api::config::ApiConfig;
use perch_api::{AppState, router};
use perch_core::auth::jwt::JwtSettings;
use perch_core::auth::password::hash_password;
use perch_core::models::auth::{AuthCredential, DEFAULT_FORGE_ID, User};
use perch_core::store::{MemoryStore, Store};
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "static-admin-token";
pub const ADMIN_LOGIN: &str = "root";
pub const SESSION_SECS: i64 = 3600;

pub fn config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: None,
        session_expires: Duration::seconds(SESSION_SECS),
        admin_token: Some(ADMIN_TOKEN.into()),
        admin_token_user: Some(ADMIN_LOGIN.into()),
        cookie_secure: false,
        jwt: JwtSettings {
            secret: "integration-jwt-secret".into(),
            issuer: "perch".into(),
            audience: "perch-api".into(),
            ttl: Duration::seconds(SESSION_SECS),
        },
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub alice: User,
    pub root: User,
}

impl TestApp {
    /// `alice` with password `correct-pw`, and the admin `root` without one.
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice", Some("correct-pw"), false).await;
        let root = seed_user(&store, ADMIN_LOGIN, None, true).await;
        let state = AppState::new(store.clone() as Arc<dyn Store>, config).expect("state");
        Self {
            app: router(state.clone()),
            state,
            store,
            alice,
            root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
        send(&self.app, request).await
    }
}

pub async fn seed_user(
    store: &MemoryStore,
    login: &str,
    password: Option<&str>,
    admin: bool,
) -> User {
    let user = store
        .create_user(User {
            id: 0,
            login: login.into(),
            email: format!("{login}@example.com"),
            avatar: String::new(),
            admin,
            hash: format!("{login}-signing-secret"),
            forge_id: DEFAULT_FORGE_ID,
            forge_remote_id: String::new(),
        })
        .await
        .expect("create user");
    if let Some(password) = password {
        store
            .create_credential(AuthCredential::new(
                user.id,
                login,
                hash_password(password).expect("hash"),
            ))
            .await
            .expect("create credential");
    }
    user
}

pub async fn send(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let resp = app.clone().oneshot(request).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, headers, json)
}

pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Value of the cookie `name` among the `set-cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Just the value part of a `set-cookie` line.
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|kv| kv.split_once('='))
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}
