//! Domain errors - error types for the domain layer

use thiserror::Error;
use uuid::Uuid;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Magic link not found")]
    MagicLinkNotFound,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Email already in use")]
    EmailAlreadyExists,

    // =========================================================================
    // Session Security Violations
    // =========================================================================
    /// A rotated-away refresh token was presented again. Handled internally by
    /// revoking the whole family; never surfaced verbatim to the caller.
    #[error("Refresh token replay detected")]
    ReplayDetected,

    #[error("Session has been revoked")]
    SessionRevoked,

    #[error("Session has expired")]
    SessionExpired,

    // =========================================================================
    // Magic Link Outcomes
    // =========================================================================
    #[error("Magic link has expired")]
    MagicLinkExpired,

    #[error("Magic link has already been used")]
    MagicLinkAlreadyUsed,

    #[error("Magic link is invalid")]
    MagicLinkInvalid,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::SessionNotFound => "UNKNOWN_SESSION",
            Self::MagicLinkNotFound => "UNKNOWN_MAGIC_LINK",

            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::WeakPassword(_) => "WEAK_PASSWORD",

            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",

            Self::ReplayDetected => "REPLAY_DETECTED",
            Self::SessionRevoked => "SESSION_REVOKED",
            Self::SessionExpired => "SESSION_EXPIRED",

            Self::MagicLinkExpired => "MAGIC_LINK_EXPIRED",
            Self::MagicLinkAlreadyUsed => "MAGIC_LINK_ALREADY_USED",
            Self::MagicLinkInvalid => "MAGIC_LINK_INVALID",

            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::SessionNotFound | Self::MagicLinkNotFound
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::InvalidEmail | Self::WeakPassword(_)
        )
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::EmailAlreadyExists)
    }

    /// Check if this error must surface as an authentication failure (401)
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ReplayDetected
                | Self::SessionRevoked
                | Self::SessionExpired
                | Self::MagicLinkExpired
                | Self::MagicLinkAlreadyUsed
                | Self::MagicLinkInvalid
        )
    }

    /// Check if this is an infrastructure error (5xx)
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::StorageUnavailable(_) | Self::InternalError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifiers() {
        assert!(DomainError::UserNotFound(Uuid::nil()).is_not_found());
        assert!(DomainError::InvalidEmail.is_validation());
        assert!(DomainError::EmailAlreadyExists.is_conflict());
        assert!(DomainError::ReplayDetected.is_auth_failure());
        assert!(DomainError::MagicLinkAlreadyUsed.is_auth_failure());
        assert!(DomainError::DatabaseError("boom".to_string()).is_infrastructure());
        assert!(!DomainError::SessionNotFound.is_auth_failure());
    }

    #[test]
    fn test_codes() {
        assert_eq!(DomainError::ReplayDetected.code(), "REPLAY_DETECTED");
        assert_eq!(
            DomainError::MagicLinkExpired.code(),
            "MAGIC_LINK_EXPIRED"
        );
    }
}
