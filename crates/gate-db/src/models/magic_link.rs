//! Magic link database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the magic_links table
#[derive(Debug, Clone, FromRow)]
pub struct MagicLinkModel {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub is_used: bool,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

impl MagicLinkModel {
    #[inline]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
