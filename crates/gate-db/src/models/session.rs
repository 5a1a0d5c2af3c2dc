//! Session database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the sessions table
#[derive(Debug, Clone, FromRow)]
pub struct SessionModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub current_jti: String,
    pub reused_jti_of: Option<String>,
    pub device_hash: String,
    pub last_ip_cidr: String,
    pub auth_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionModel {
    /// Check if the row is revoked
    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check if the row is expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the row can still serve a rotation
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}
