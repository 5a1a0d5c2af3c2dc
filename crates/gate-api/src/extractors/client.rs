//! Client metadata extractor
//!
//! Captures the user agent and client IP for session fingerprinting and
//! abuse control. The raw values never reach storage; the service layer
//! reduces them to hashes/networks.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use gate_service::ClientInfo;

/// Client metadata wrapper. Infallible: missing headers degrade to
/// placeholder values rather than rejecting the request.
#[derive(Debug, Clone)]
pub struct Client(pub ClientInfo);

#[async_trait]
impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        // First hop of X-Forwarded-For, set by the reverse proxy in front of
        // this service; direct connections have no trustworthy source here.
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        Ok(Client(ClientInfo::new(user_agent, ip)))
    }
}
