//! CSRF double-submit guard
//!
//! Mutating methods (POST/PUT/PATCH/DELETE) must present the `csrf_token`
//! cookie and the matching `x-csrf-token` header, and the token must be valid
//! for the authenticated session and user agent. All other methods are exempt
//! by design, as are the pre-session endpoints (login, register, refresh,
//! magic links) where no CSRF token can exist yet.
//!
//! Every rejection path is padded to a minimum duration so an early reject
//! (missing header) and a late reject (MAC mismatch) are not distinguishable
//! by timing.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use gate_common::{constant_time_eq, AppConfig};
use tokio::time::Instant;

use crate::response::ApiError;
use crate::state::AppState;

/// Cookie carrying the double-submit token; readable by the frontend so it
/// can mirror the value into the header
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// Header the frontend mirrors the cookie into
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Floor for rejection latency (timing-uniform rejects)
const MIN_REJECT_DURATION: Duration = Duration::from_millis(100);

/// Endpoints that authenticate by credential or signed token instead of an
/// ambient cookie; no CSRF token can exist before they succeed
const CSRF_EXEMPT_PATHS: &[&str] = &[
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/refresh",
    "/api/v1/auth/magic-link",
    "/api/v1/auth/magic-link/consume",
];

/// Axum middleware enforcing the double-submit check on mutating requests
pub async fn csrf_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !requires_csrf_check(req.method()) {
        return next.run(req).await;
    }
    if CSRF_EXEMPT_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let started = Instant::now();
    if validate_request(&state, &req) {
        return next.run(req).await;
    }

    // Pad the rejection so its timing does not reveal which check failed.
    tokio::time::sleep_until(started + MIN_REJECT_DURATION).await;
    ApiError::CsrfRejected.into_response()
}

/// Only mutating methods carry CSRF risk
fn requires_csrf_check(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn validate_request(state: &AppState, req: &Request) -> bool {
    let jar = CookieJar::from_headers(req.headers());
    let cookie_token = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string());
    let header_token = req
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    // The token is bound to the authenticated principal; an unverifiable
    // bearer token cannot anchor a CSRF check.
    let session_id = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.token_manager().verify_access_token(token))
        .map(|claims| claims.sub);

    let (Some(cookie_token), Some(header_token), Some(session_id)) =
        (cookie_token, header_token, session_id)
    else {
        return false;
    };

    // Double submit: cookie and header must agree...
    if !constant_time_eq(cookie_token.as_bytes(), header_token.as_bytes()) {
        return false;
    }

    // ...and the value must be one we would have computed for this session.
    state
        .csrf_manager()
        .validate_token(&header_token, &session_id, user_agent)
}

/// Build the CSRF cookie with environment-appropriate attributes.
///
/// Production: `Secure`, `SameSite=None`, scoped domain, 1h max-age.
/// Development: relaxed `SameSite=Lax`, non-secure. The cookie is not
/// HttpOnly on purpose - the frontend must read it to mirror it into the
/// header.
pub fn build_csrf_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    let mut builder = Cookie::build((CSRF_COOKIE_NAME, token))
        .path("/")
        .http_only(false)
        .max_age(time::Duration::hours(1));

    if config.app.env.is_production() {
        builder = builder.secure(true).same_site(SameSite::None);
        if let Some(domain) = &config.csrf.cookie_domain {
            builder = builder.domain(domain.clone());
        }
    } else {
        builder = builder.secure(false).same_site(SameSite::Lax);
    }

    builder.build()
}
