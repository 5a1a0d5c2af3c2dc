//! Magic link entity - a single-use email sign-in grant
//!
//! Rows are created on issuance and immutably finalized (used or invalidated),
//! never deleted synchronously - the table doubles as an audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted magic-link row. Only a hash of the signed token is stored; the raw
/// token exists solely inside the email that was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: Uuid,
    pub email: String,
    /// SHA-256 of the full signed token
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub is_used: bool,
    /// Issuing client IP, kept for abuse forensics
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

impl MagicLink {
    pub fn new(
        id: Uuid,
        email: String,
        token_hash: String,
        ip_address: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            token_hash,
            expires_at,
            used_at: None,
            is_used: false,
            ip_address,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A link that can still win the consumption race
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_pending_link() {
        let link = MagicLink::new(
            Uuid::new_v4(),
            "a@example.com".to_string(),
            "deadbeef".to_string(),
            "203.0.113.7".to_string(),
            Utc::now() + Duration::minutes(20),
        );
        assert!(link.is_pending(Utc::now()));
        assert!(!link.is_expired(Utc::now()));
    }

    #[test]
    fn test_expired_link_is_not_pending() {
        let link = MagicLink::new(
            Uuid::new_v4(),
            "a@example.com".to_string(),
            "deadbeef".to_string(),
            "203.0.113.7".to_string(),
            Utc::now() - Duration::minutes(1),
        );
        assert!(!link.is_pending(Utc::now()));
    }

    #[test]
    fn test_used_link_is_not_pending() {
        let mut link = MagicLink::new(
            Uuid::new_v4(),
            "a@example.com".to_string(),
            "deadbeef".to_string(),
            "203.0.113.7".to_string(),
            Utc::now() + Duration::minutes(20),
        );
        link.is_used = true;
        link.used_at = Some(Utc::now());
        assert!(!link.is_pending(Utc::now()));
    }
}
