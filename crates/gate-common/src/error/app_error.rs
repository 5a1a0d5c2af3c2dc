//! Application error types
//!
//! Unified error handling for the entire application. The authentication
//! taxonomy is enumerated here rather than carried as string-keyed maps so
//! every caller matches on typed variants.

use gate_core::DomainError;
use serde::Serialize;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authentication")]
    MissingAuth,

    /// Internal escalation marker. Callers revoke the session family and then
    /// surface this as a generic `InvalidToken`; the detection detail never
    /// reaches the requester.
    #[error("Refresh token replay detected")]
    ReplayDetected,

    // Abuse control
    #[error("Too many failed attempts; retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("CAPTCHA verification required")]
    CaptchaRequired,

    #[error("CAPTCHA verification failed")]
    CaptchaFailed,

    // Magic links
    #[error("Magic link has expired")]
    MagicLinkExpired,

    #[error("Magic link has already been used")]
    MagicLinkAlreadyUsed,

    #[error("Magic link is invalid")]
    MagicLinkInvalid,

    // CSRF
    #[error("CSRF validation failed")]
    CsrfRejected,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) => 400,

            // 401 Unauthorized
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::MissingAuth
            | Self::ReplayDetected
            | Self::MagicLinkExpired
            | Self::MagicLinkAlreadyUsed
            | Self::MagicLinkInvalid => 401,

            // 403 Forbidden
            Self::CaptchaRequired | Self::CaptchaFailed | Self::CsrfRejected => 403,

            // 404 Not Found
            Self::NotFound(_) => 404,

            // 409 Conflict
            Self::Conflict(_) => 409,

            // 429 Too Many Requests
            Self::RateLimited { .. } => 429,

            // 500 Internal Server Error
            Self::Database(_)
            | Self::Cache(_)
            | Self::StorageUnavailable(_)
            | Self::ExternalService(_)
            | Self::Internal(_)
            | Self::Config(_) => 500,

            // Map domain errors to appropriate status codes
            Self::Domain(e) => {
                if e.is_not_found() {
                    404
                } else if e.is_validation() {
                    400
                } else if e.is_conflict() {
                    409
                } else if e.is_auth_failure() {
                    401
                } else {
                    500
                }
            }
        }
    }

    /// Get error code for API responses.
    ///
    /// Replay detection deliberately shares the invalid-token code so the
    /// response gives an attacker no confirmation that the replay was noticed.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken | Self::ReplayDetected => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MissingAuth => "MISSING_AUTH",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::CaptchaRequired => "CAPTCHA_REQUIRED",
            Self::CaptchaFailed => "CAPTCHA_FAILED",
            Self::MagicLinkExpired => "MAGIC_LINK_EXPIRED",
            Self::MagicLinkAlreadyUsed => "MAGIC_LINK_ALREADY_USED",
            Self::MagicLinkInvalid => "MAGIC_LINK_INVALID",
            Self::CsrfRejected => "CSRF_REJECTED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Retry-After seconds, when the error carries one
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }

    /// Create a not found error for a resource type
    #[must_use]
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::NotFound(resource.to_string())
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Error response structure for API responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            retry_after: err.retry_after(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
