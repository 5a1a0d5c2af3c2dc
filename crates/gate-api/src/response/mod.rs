//! Response types and error handling for API endpoints
//!
//! Provides unified error handling and JSON response formatting. Status codes
//! are chosen here, at the HTTP boundary; the lower layers only classify.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gate_common::AppError;
use gate_core::DomainError;
use gate_service::ServiceError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// API error type for consistent error responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    App(#[from] AppError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("CSRF validation failed")]
    CsrfRejected,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Create an invalid-body error
    pub fn invalid_body(msg: impl Into<String>) -> Self {
        Self::InvalidBody(msg.into())
    }

    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::App(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Service(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Domain(e) => {
                if e.is_not_found() {
                    StatusCode::NOT_FOUND
                } else if e.is_validation() {
                    StatusCode::BAD_REQUEST
                } else if e.is_conflict() {
                    StatusCode::CONFLICT
                } else if e.is_auth_failure() {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            Self::Validation(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingAuth | Self::InvalidAuthFormat => StatusCode::UNAUTHORIZED,
            Self::CsrfRejected => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::App(e) => e.error_code(),
            Self::Service(e) => e.error_code(),
            Self::Domain(e) => e.code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::MissingAuth => "MISSING_AUTH",
            Self::InvalidAuthFormat => "INVALID_AUTH_FORMAT",
            Self::CsrfRejected => "CSRF_REJECTED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::App(e) => e.retry_after(),
            Self::Service(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, code = self.error_code(), "Request failed");
        }

        // Server-side detail never leaks into 5xx bodies.
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let retry_after = self.retry_after();
        let body = ErrorBody {
            code: self.error_code().to_string(),
            message,
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// 201 Created wrapper
pub struct Created<T>(pub T);

impl<T: IntoResponse> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, self.0).into_response()
    }
}

/// 202 Accepted wrapper
pub struct Accepted<T>(pub T);

impl<T: IntoResponse> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, self.0).into_response()
    }
}

/// 204 No Content response
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::App(AppError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::App(AppError::CaptchaRequired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::App(AppError::RateLimited {
                retry_after_seconds: 300
            })
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::CsrfRejected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Domain(DomainError::MagicLinkAlreadyUsed).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ApiError::MissingAuth.error_code(), "MISSING_AUTH");
        assert_eq!(ApiError::CsrfRejected.error_code(), "CSRF_REJECTED");
        // Replay shares the generic invalid-token code end to end
        assert_eq!(
            ApiError::App(AppError::ReplayDetected).error_code(),
            "INVALID_TOKEN"
        );
    }
}
