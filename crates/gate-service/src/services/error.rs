//! Service layer error types
//!
//! Provides a unified error type for all service operations.

use gate_common::AppError;
use gate_core::DomainError;
use std::fmt;

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Domain rule violation
    Domain(DomainError),

    /// Application error (auth, abuse control, validation, etc.)
    App(AppError),

    /// Resource not found
    NotFound { resource: &'static str, id: String },

    /// Validation error
    Validation(String),

    /// Conflict (e.g., duplicate resource)
    Conflict(String),

    /// Internal error
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::App(e) => write!(f, "{e}"),
            Self::NotFound { resource, id } => write!(f, "{resource} not found: {id}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::App(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
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
            Self::App(e) => e.status_code(),
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.error_code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Retry-After seconds, when the underlying error carries one
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::App(e) => e.retry_after(),
            _ => None,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => AppError::Domain(e),
            ServiceError::App(e) => e,
            ServiceError::NotFound { resource, id } => {
                AppError::NotFound(format!("{resource} {id}"))
            }
            ServiceError::Validation(msg) => AppError::Validation(msg),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::Internal(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = ServiceError::not_found("User", "123");
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(err.to_string().contains("User not found: 123"));
    }

    #[test]
    fn test_app_error_passthrough() {
        let err = ServiceError::App(AppError::CaptchaRequired);
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "CAPTCHA_REQUIRED");

        let err = ServiceError::App(AppError::RateLimited {
            retry_after_seconds: 300,
        });
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.retry_after(), Some(300));
    }

    #[test]
    fn test_domain_auth_failure_is_401() {
        let err = ServiceError::Domain(DomainError::MagicLinkAlreadyUsed);
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_convert_to_app_error() {
        let service_err = ServiceError::not_found("Session", "456");
        let app_err: AppError = service_err.into();
        assert_eq!(app_err.status_code(), 404);
    }
}
