//! Session entity <-> model mapper

use gate_core::entities::Session;

use crate::models::SessionModel;

/// Convert SessionModel to Session entity
impl From<SessionModel> for Session {
    fn from(model: SessionModel) -> Self {
        Session {
            id: model.id,
            user_id: model.user_id,
            family_id: model.family_id,
            current_jti: model.current_jti,
            reused_jti_of: model.reused_jti_of,
            device_hash: model.device_hash,
            last_ip_cidr: model.last_ip_cidr,
            auth_time: model.auth_time,
            created_at: model.created_at,
            last_used: model.last_used,
            expires_at: model.expires_at,
            revoked_at: model.revoked_at,
        }
    }
}
