//! Session entity - one refresh-token lineage row
//!
//! A session row is created on login, mutated in place on every rotation, and
//! terminally marked on revocation. All rows minted from one login share a
//! `family_id`, which is the unit of revocation when a replay is detected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a session row.
///
/// `Revoked` and `Expired` are terminal. `Rotated` is a transient label for a
/// presented JTI that the row has already rotated away from (see [`JtiStatus`]);
/// the row itself stays `Active` under its new JTI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Revoked,
    Expired,
}

/// How a presented refresh-token JTI relates to a session row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JtiStatus {
    /// The row's live JTI - a rotation attempt may proceed
    Current,
    /// The JTI this row rotated away from - presenting it again is a replay
    RotatedAway,
    /// Not related to this row at all
    Unknown,
}

/// Session entity persisted per refresh-token family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Groups every token descended from one original login
    pub family_id: Uuid,
    /// The active refresh-token identifier
    pub current_jti: String,
    /// The JTI this row last rotated from, if any
    pub reused_jti_of: Option<String>,
    /// Fingerprint of the client user agent, never the raw value
    pub device_hash: String,
    /// Network of the last client IP (/24 or /64), never the raw address
    pub last_ip_cidr: String,
    /// Last strong authentication (login or magic-link consumption)
    pub auth_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Terminal marker; set exactly once
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh session row for a new login (new family)
    pub fn new(
        user_id: Uuid,
        jti: String,
        device_hash: String,
        last_ip_cidr: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            family_id: Uuid::new_v4(),
            current_jti: jti,
            reused_jti_of: None,
            device_hash,
            last_ip_cidr,
            auth_time: now,
            created_at: now,
            last_used: now,
            expires_at,
            revoked_at: None,
        }
    }

    /// Derive the lifecycle state at `now`
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked_at.is_some() {
            SessionState::Revoked
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    /// Classify a presented JTI against this row
    pub fn jti_status(&self, jti: &str) -> JtiStatus {
        if jti == self.current_jti {
            JtiStatus::Current
        } else if self.reused_jti_of.as_deref() == Some(jti) {
            JtiStatus::RotatedAway
        } else {
            JtiStatus::Unknown
        }
    }

    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check that the row can still serve a rotation at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_session() -> Session {
        Session::new(
            Uuid::new_v4(),
            "jti-1".to_string(),
            "devhash".to_string(),
            "203.0.113.0/24".to_string(),
            Utc::now() + Duration::days(7),
        )
    }

    #[test]
    fn test_fresh_session_is_active() {
        let session = test_session();
        assert_eq!(session.state(Utc::now()), SessionState::Active);
        assert!(session.is_active(Utc::now()));
        assert!(!session.is_revoked());
    }

    #[test]
    fn test_revoked_wins_over_expired() {
        let mut session = test_session();
        session.expires_at = Utc::now() - Duration::hours(1);
        session.revoked_at = Some(Utc::now());
        assert_eq!(session.state(Utc::now()), SessionState::Revoked);
    }

    #[test]
    fn test_expired_state() {
        let mut session = test_session();
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert_eq!(session.state(Utc::now()), SessionState::Expired);
    }

    #[test]
    fn test_jti_status() {
        let mut session = test_session();
        session.reused_jti_of = Some("jti-0".to_string());

        assert_eq!(session.jti_status("jti-1"), JtiStatus::Current);
        assert_eq!(session.jti_status("jti-0"), JtiStatus::RotatedAway);
        assert_eq!(session.jti_status("jti-9"), JtiStatus::Unknown);
    }
}
