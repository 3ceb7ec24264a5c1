//! # dashboard_api
//!
//! HTTP API library for the dashboard server.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use dashboard_core::accounts::{Accounts, StoreUserService};
use dashboard_core::mail::Mailer;
use dashboard_core::store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, health, oauth, users};
use crate::middleware::auth::{AuthGate, Requirements, authenticate};
use crate::services::cookies::{REQUEST_ID_HEADER, TOKEN_HEADER};

/// Base path of every route.
pub const API_PREFIX: &str = "/api/v1";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the account service over `store` and `mailer`.
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: ApiConfig) -> Self {
        let users = Arc::new(StoreUserService::new(store.clone()));
        let accounts = Accounts::new(users, store, mailer, config.accounts_config());
        Self { accounts, config }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([TOKEN_HEADER, REQUEST_ID_HEADER]);

    let anonymous = Router::new()
        .route("/users/signup", post(users::signup_handler))
        .route("/users/login", post(users::login_handler))
        .route("/users/logout", post(users::logout_handler))
        .route("/users/forgot-password", post(users::forgot_password_handler))
        .route(
            "/users/reset-password-complete",
            post(users::reset_password_complete_handler),
        )
        .route(
            "/users/verify-email-complete",
            post(users::verify_email_complete_handler),
        )
        .route("/oauth/github/connect", get(oauth::github_connect_handler))
        .route("/health", get(health::health_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Requirements::ANONYMOUS),
            authenticate,
        ));

    let session = Router::new()
        .route("/users/verify-email", post(users::verify_email_start_handler))
        .route("/users/me", get(users::get_me_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Requirements::SESSION),
            authenticate,
        ));

    let verified = Router::new()
        .route("/users/me", put(users::update_me_handler))
        .route("/users/me/password", put(users::update_password_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Requirements::VERIFIED),
            authenticate,
        ));

    let admin = Router::new()
        .route("/admin/users/{id}", get(admin::get_user_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Requirements::ADMIN),
            authenticate,
        ));

    let api = Router::new()
        .merge(anonymous)
        .merge(session)
        .merge(verified)
        .merge(admin);

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
