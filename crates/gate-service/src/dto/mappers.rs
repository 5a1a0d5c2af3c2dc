//! Entity to DTO mappers

use gate_core::entities::{Session, User};

use super::responses::{CurrentUserResponse, SessionResponse};

impl From<&User> for CurrentUserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            device_hash: session.device_hash.clone(),
            last_ip_cidr: session.last_ip_cidr.clone(),
            created_at: session.created_at,
            last_used: session.last_used,
            expires_at: session.expires_at,
        }
    }
}
