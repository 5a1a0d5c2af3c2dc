//! Test fixtures and data generators
//!
//! Provides reusable test data for integration tests.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Registration request
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub remember_me: bool,
}

impl RegisterRequest {
    pub fn unique() -> Self {
        let suffix = unique_suffix();
        Self {
            email: format!("test{suffix}@example.com"),
            password: "TestPass123!".to_string(),
            display_name: Some(format!("Test User {suffix}")),
            remember_me: false,
        }
    }
}

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
    pub captcha_token: Option<String>,
}

impl LoginRequest {
    pub fn from_register(reg: &RegisterRequest) -> Self {
        Self {
            email: reg.email.clone(),
            password: reg.password.clone(),
            remember_me: false,
            captcha_token: None,
        }
    }

    pub fn wrong_password(reg: &RegisterRequest) -> Self {
        Self {
            email: reg.email.clone(),
            password: "WrongPass999!".to_string(),
            remember_me: false,
            captcha_token: None,
        }
    }
}

/// Refresh request
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Magic link request
#[derive(Debug, Serialize)]
pub struct MagicLinkRequest {
    pub email: String,
    pub return_to: Option<String>,
}

/// Auth response
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// User response
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub roles: Vec<String>,
}

/// Error body
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retry_after: Option<u64>,
}

/// Session listing entry
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub device_hash: String,
    pub last_ip_cidr: String,
}
