//! Response DTOs for API endpoints
//!
//! All response DTOs implement `Serialize` for JSON output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Auth Responses
// ============================================================================

/// Authentication response with tokens
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    pub user: CurrentUserResponse,
}

impl AuthResponse {
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        user: CurrentUserResponse,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            user,
        }
    }
}

/// Current user profile
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Verdict of the login abuse gate
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoginGate {
    pub allowed: bool,
    pub requires_captcha: bool,
    pub backoff_seconds: u64,
    pub attempts_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginGate {
    /// Gate verdict for a clean identifier
    pub fn open(attempts_remaining: u32) -> Self {
        Self {
            allowed: true,
            requires_captcha: false,
            backoff_seconds: 0,
            attempts_remaining,
            message: None,
        }
    }
}

/// One active session for the account-security page. Only fingerprints are
/// exposed, matching what is stored.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub device_hash: String,
    pub last_ip_cidr: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
