//! User entity - represents an account holder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User entity representing an account in the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    /// Role names carried into access-token claims
    pub roles: Vec<String>,
    /// Set after the first successful magic-link consumption or explicit verification
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the default `user` role
    pub fn new(id: Uuid, email: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            display_name: None,
            roles: vec!["user".to_string()],
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the user carries a given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Normalize an email address for lookup and storage: trimmed, lowercased
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(Uuid::new_v4(), "a@example.com".to_string());
        assert!(user.has_role("user"));
        assert!(!user.has_role("admin"));
        assert!(!user.email_verified);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(User::normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(User::normalize_email("bob@example.com"), "bob@example.com");
    }
}
