//! Request DTOs for API endpoints
//!
//! All request DTOs implement `Deserialize` and `Validate` for input validation.

use serde::Deserialize;
use validator::Validate;

/// Per-request client metadata captured at the HTTP boundary. Only derived
/// fingerprints of these values reach storage.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: String,
    pub ip: String,
}

impl ClientInfo {
    pub fn new(user_agent: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip: ip.into(),
        }
    }
}

// ============================================================================
// Auth Requests
// ============================================================================

/// User registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 72, message = "Password must be 8-72 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: Option<String>,

    #[serde(default)]
    pub remember_me: bool,
}

/// User login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[serde(default)]
    pub remember_me: bool,

    /// CAPTCHA response token, required once the abuse gate demands one
    #[serde(default)]
    pub captcha_token: Option<String>,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Logout request (optional refresh token selecting the family to revoke)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

// ============================================================================
// Magic Link Requests
// ============================================================================

/// Request a single-use sign-in link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MagicLinkRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Relative path to return the user to after sign-in
    #[validate(length(max = 512, message = "Return path too long"))]
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Redeem a single-use sign-in link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MagicLinkConsumeRequest {
    pub token: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "a@example.com".to_string(),
            password: "SecurePass1".to_string(),
            display_name: None,
            remember_me: false,
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "short".to_string(),
            ..valid
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_login_request_defaults() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"a@example.com","password":"pw"}"#).unwrap();
        assert!(!request.remember_me);
        assert!(request.captcha_token.is_none());
    }
}
