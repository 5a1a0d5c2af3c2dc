//! Magic link entity <-> model mapper

use gate_core::entities::MagicLink;

use crate::models::MagicLinkModel;

/// Convert MagicLinkModel to MagicLink entity
impl From<MagicLinkModel> for MagicLink {
    fn from(model: MagicLinkModel) -> Self {
        MagicLink {
            id: model.id,
            email: model.email,
            token_hash: model.token_hash,
            expires_at: model.expires_at,
            used_at: model.used_at,
            is_used: model.is_used,
            ip_address: model.ip_address,
            created_at: model.created_at,
        }
    }
}
