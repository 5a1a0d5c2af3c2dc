//! Error handling utilities for repositories

use gate_core::error::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError.
///
/// Connectivity failures map to `StorageUnavailable` so callers can
/// distinguish "the store said no" from "the store is gone"; everything else
/// is a generic database error. Both reject on the session/link paths.
pub fn map_db_error(e: SqlxError) -> DomainError {
    match &e {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            DomainError::StorageUnavailable(e.to_string())
        }
        _ => DomainError::DatabaseError(e.to_string()),
    }
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique();
        }
    }
    map_db_error(e)
}

/// Create a "user not found" error
pub fn user_not_found(id: uuid::Uuid) -> DomainError {
    DomainError::UserNotFound(id)
}
