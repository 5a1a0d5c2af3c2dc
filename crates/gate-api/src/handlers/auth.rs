//! Authentication handlers
//!
//! Endpoints for registration, login, token refresh, logout, and session
//! management.

use axum::{extract::State, Json};
use gate_common::AppError;
use gate_service::{
    AuthResponse, AuthService, LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest,
    SessionResponse,
};
use serde::Serialize;

use crate::extractors::{AuthUser, Client, ValidatedJson};
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// Register a new user
///
/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Client(client): Client,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<Created<Json<AuthResponse>>> {
    let service = AuthService::new(state.service_context());
    let response = service.register(request, &client).await?;
    Ok(Created(Json(response)))
}

/// Login with email and password
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let service = AuthService::new(state.service_context());
    let response = service.login(request, &client).await?;
    Ok(Json(response))
}

/// Rotate a refresh token into a fresh token pair
///
/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let service = AuthService::new(state.service_context());
    let response = service.refresh_tokens(request).await?;
    Ok(Json(response))
}

/// Logout: revoke one session family, or all of them
///
/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<NoContent> {
    let service = AuthService::new(state.service_context());
    let refresh_token = body.and_then(|b| b.0.refresh_token);
    service.logout(auth.user_id, refresh_token).await?;
    Ok(NoContent)
}

/// Active sessions for the current user
///
/// GET /auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let service = AuthService::new(state.service_context());
    let sessions = service.list_sessions(auth.user_id).await?;
    Ok(Json(sessions))
}

/// Result of a cleanup sweep
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

/// Sweep expired/revoked session rows. Admin-only; meant to be hit by an
/// external scheduler, not by end users.
///
/// POST /auth/sessions/cleanup
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<CleanupResponse>> {
    if !auth.has_role("admin") {
        return Err(AppError::NotFound("resource".to_string()).into());
    }

    let service = AuthService::new(state.service_context());
    let removed = service.cleanup_expired_sessions().await?;
    Ok(Json(CleanupResponse { removed }))
}
