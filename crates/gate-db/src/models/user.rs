//! User database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the users table
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub roles: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserModel {
    /// Whether the account can authenticate with a password at all
    #[inline]
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}
