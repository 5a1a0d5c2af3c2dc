//! Middleware stack for the API server
//!
//! The chain is explicit and evaluated in a fixed order for every request:
//!
//! 1. transport rate limit (governor, global key)
//! 2. request-id generation + propagation
//! 3. tracing span
//! 4. timeout
//! 5. CORS
//! 6. CSRF guard (mutating methods only, see `csrf`)
//! 7. handler
//!
//! Each stage returns a typed rejection; nothing later in the chain runs once
//! a stage has rejected.

pub mod csrf;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    Router,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use gate_common::{CorsConfig, RateLimitConfig};

use crate::state::AppState;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Apply the full middleware stack to the router.
///
/// Layers execute top-down per the module docs; axum applies them in reverse
/// registration order, so the code below registers innermost first.
pub fn apply_middleware(
    router: Router<AppState>,
    state: &AppState,
    rate_limit_config: &RateLimitConfig,
    cors_config: &CorsConfig,
    is_production: bool,
) -> Router<AppState> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(rate_limit_config.requests_per_second.into())
            .burst_size(rate_limit_config.burst)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("rate limiter configuration is valid"),
    );

    router
        // CSRF guard (innermost: runs right before the handler)
        .layer(from_fn_with_state(state.clone(), csrf::csrf_guard))
        // CORS
        .layer(create_cors_layer(cors_config, is_production))
        // Timeout (503 on expiry)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            Duration::from_secs(30),
        ))
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    // Raw client identifiers (UA, IP) stay out of the span;
                    // the request id is the correlation handle.
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Request ID propagation
        .layer(PropagateRequestIdLayer::new(header::HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        // Request ID generation
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
        // Rate limiting (outermost: applied first to incoming requests)
        .layer(GovernorLayer {
            config: governor_conf,
        })
}

/// CORS layer: explicit origin allowlist outside development.
///
/// The CSRF header must be allowed through preflight or the double-submit
/// check could never pass from a browser.
fn create_cors_layer(config: &CorsConfig, is_production: bool) -> CorsLayer {
    let base_layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
            header::HeaderName::from_static(csrf::CSRF_HEADER_NAME),
        ])
        .allow_credentials(true)
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)]);

    // The CSRF cookie rides cross-origin requests, so a wildcard origin is
    // only tolerable in development with nothing configured.
    if config.allowed_origins.is_empty() {
        if is_production {
            tracing::warn!(
                "CORS: no allowed origins configured in production; browser requests will be blocked"
            );
            return base_layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()));
        }
        tracing::warn!("CORS: allowing any origin (development only)");
        // allow_credentials cannot combine with a wildcard origin
        return CorsLayer::very_permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            })
        })
        .collect();

    tracing::info!(count = origins.len(), "CORS origin allowlist configured");
    base_layer.allow_origin(AllowOrigin::list(origins))
}
