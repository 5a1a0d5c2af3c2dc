//! Authentication extractor
//!
//! Extracts and validates JWT access tokens from the Authorization header.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated user extracted from a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Check whether the token carried a given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::MissingAuth)?;

        let app_state = AppState::from_ref(state);

        // Verification returns None on any failure; the HTTP layer picks 401.
        let claims = app_state
            .token_manager()
            .verify_access_token(bearer.token())
            .ok_or_else(|| {
                tracing::warn!("Invalid access token");
                ApiError::InvalidAuthFormat
            })?;

        let user_id = claims.user_id().map_err(|e| {
            tracing::warn!(error = %e, "Invalid user ID in token");
            ApiError::InvalidAuthFormat
        })?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            roles: claims.roles,
        })
    }
}
