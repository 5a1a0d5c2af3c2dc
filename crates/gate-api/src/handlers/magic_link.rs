//! Magic-link handlers
//!
//! Issuance always answers 202 with the same body whether or not a link was
//! sent - account existence and throttling stay unobservable to the caller.
//! Consumption returns the full token pair on success and the distinct
//! already-used/expired failures otherwise.

use axum::{extract::State, Json};
use gate_service::{AuthResponse, MagicLinkConsumeRequest, MagicLinkRequest, MagicLinkService};
use serde::Serialize;
use tracing::warn;

use crate::extractors::{Client, ValidatedJson};
use crate::response::{Accepted, ApiResult};
use crate::state::AppState;

/// Body returned for every issuance request
#[derive(Debug, Serialize)]
pub struct MagicLinkRequested {
    pub message: &'static str,
}

/// Request a single-use sign-in link
///
/// POST /auth/magic-link
pub async fn request_magic_link(
    State(state): State<AppState>,
    Client(client): Client,
    ValidatedJson(request): ValidatedJson<MagicLinkRequest>,
) -> Accepted<Json<MagicLinkRequested>> {
    let service = MagicLinkService::new(state.service_context());

    // Failures (rate limits, delivery problems, storage errors) are logged
    // and swallowed; the response must not vary with them.
    if let Err(e) = service.create_and_send_magic_link(request, &client).await {
        warn!(error = %e, "Magic-link issuance failed");
    }

    Accepted(Json(MagicLinkRequested {
        message: "If the address is valid, a sign-in link is on its way.",
    }))
}

/// Redeem a single-use sign-in link
///
/// POST /auth/magic-link/consume
pub async fn consume_magic_link(
    State(state): State<AppState>,
    Client(client): Client,
    ValidatedJson(request): ValidatedJson<MagicLinkConsumeRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let service = MagicLinkService::new(state.service_context());
    let response = service.consume_magic_link(request, &client).await?;
    Ok(Json(response))
}
