//! CSRF token issuance
//!
//! Hands the authenticated client its double-submit token, both in the body
//! and as the environment-scoped cookie. Validity is recomputed on every
//! check; nothing is stored server-side.

use axum::{extract::State, http::header::USER_AGENT, http::HeaderMap, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::extractors::AuthUser;
use crate::middleware::csrf::build_csrf_cookie;
use crate::response::ApiResult;
use crate::state::AppState;

/// CSRF token response body
#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Issue the CSRF token for the current session
///
/// GET /auth/csrf
pub async fn issue_csrf_token(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<CsrfTokenResponse>)> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let token = state
        .csrf_manager()
        .generate_token(&auth.user_id.to_string(), user_agent);

    let jar = jar.add(build_csrf_cookie(state.config(), token.clone()));
    Ok((jar, Json(CsrfTokenResponse { csrf_token: token })))
}
