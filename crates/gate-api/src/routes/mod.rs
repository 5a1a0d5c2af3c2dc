//! Route definitions
//!
//! All API routes mounted under /api/v1.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{auth, csrf, health, magic_link};
use crate::state::AppState;

/// Create the main API router with all routes (excluding health, which is
/// exported separately to bypass rate limiting)
pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new().merge(auth_routes())
}

/// Authentication routes
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/sessions", get(auth::list_sessions))
        .route("/auth/sessions/cleanup", post(auth::cleanup_sessions))
        .route("/auth/csrf", get(csrf::issue_csrf_token))
        .route("/auth/magic-link", post(magic_link::request_magic_link))
        .route(
            "/auth/magic-link/consume",
            post(magic_link::consume_magic_link),
        )
}
