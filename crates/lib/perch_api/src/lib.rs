//! # perch_api
//!
//! HTTP identity layer for Perch: password login, the per-request identity
//! middleware, and the gates downstream handlers sit behind.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use perch_core::auth::AuthError;
use perch_core::auth::jwt::JwtCell;
use perch_core::store::Store;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, users};
use crate::middleware::{gates, identity};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential store.
    pub store: Arc<dyn Store>,
    /// API configuration.
    pub config: ApiConfig,
    /// Server-wide JWT issuer, configured once.
    pub jwt: Arc<JwtCell>,
}

impl AppState {
    /// Build the state, configuring the JWT issuer from `config.jwt`.
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Result<Self, AuthError> {
        let jwt = JwtCell::configured(config.jwt.clone())?;
        Ok(Self {
            store,
            config,
            jwt: Arc::new(jwt),
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no principal required)
    let public = Router::new().route(routes::POST_AUTH_LOGIN, post(auth::login_handler));

    // Any authenticated principal
    let authenticated = Router::new()
        .route(routes::GET_USER, get(users::current_user_handler))
        .route_layer(axum::middleware::from_fn(gates::must_user));

    // Site admins only
    let admin = Router::new()
        .route(routes::POST_USERS, post(users::create_user_handler))
        .route(routes::PUT_USER_PASSWORD, put(users::set_password_handler))
        .route_layer(axum::middleware::from_fn(gates::must_admin));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity::resolve_identity,
        ))
        .layer(cors)
        .with_state(state)
}
