//! User entity <-> model mapper

use gate_core::entities::User;

use crate::models::UserModel;

/// Convert UserModel to User entity
impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        User {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            roles: model.roles,
            email_verified: model.email_verified,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
