//! PostgreSQL implementation of SessionRepository
//!
//! The session store doubles as the replay detector: rotation is a single
//! guarded UPDATE, so of two concurrent refreshes presenting the same stale
//! JTI exactly one can win and the other observes zero rows - the replay
//! signal. A partial unique index on `(family_id, current_jti) WHERE
//! revoked_at IS NULL` backs the invariant at the storage layer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use gate_core::entities::Session;
use gate_core::traits::{RepoResult, SessionRepository};

use crate::models::SessionModel;

use super::error::map_db_error;

const SESSION_COLUMNS: &str = "id, user_id, family_id, current_jti, reused_jti_of, device_hash, \
     last_ip_cidr, auth_time, created_at, last_used, expires_at, revoked_at";

/// PostgreSQL implementation of SessionRepository
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new PgSessionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
    async fn create(&self, session: &Session) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO sessions (id, user_id, family_id, current_jti, reused_jti_of,
                                  device_hash, last_ip_cidr, auth_time, created_at,
                                  last_used, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.family_id)
        .bind(&session.current_jti)
        .bind(&session.reused_jti_of)
        .bind(&session.device_hash)
        .bind(&session.last_ip_cidr)
        .bind(session.auth_time)
        .bind(session.created_at)
        .bind(session.last_used)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self, jti))]
    async fn find_by_current_jti(&self, jti: &str) -> RepoResult<Option<Session>> {
        let result = sqlx::query_as::<_, SessionModel>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE current_jti = $1"
        ))
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Session::from))
    }

    #[instrument(skip(self, old_jti, new_jti), fields(family_id = %family_id))]
    async fn rotate_token(
        &self,
        family_id: Uuid,
        old_jti: &str,
        new_jti: &str,
        new_expires_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        // Single atomic statement: the guard on current_jti + revoked_at +
        // expires_at closes the window between two refreshes racing on the
        // same stale token. Zero rows means the caller must run the replay
        // check, not report not-found.
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET current_jti = $3,
                reused_jti_of = $2,
                last_used = NOW(),
                expires_at = $4
            WHERE family_id = $1
              AND current_jti = $2
              AND revoked_at IS NULL
              AND expires_at > NOW()
            ",
        )
        .bind(family_id)
        .bind(old_jti)
        .bind(new_jti)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, jti))]
    async fn find_by_reused_jti(&self, jti: &str) -> RepoResult<Option<Session>> {
        let result = sqlx::query_as::<_, SessionModel>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE reused_jti_of = $1"
        ))
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Session::from))
    }

    #[instrument(skip(self), fields(family_id = %family_id, reason = reason))]
    async fn revoke_family(&self, family_id: Uuid, reason: &str) -> RepoResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET revoked_at = NOW()
            WHERE family_id = $1 AND revoked_at IS NULL
            ",
        )
        .bind(family_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        let revoked = result.rows_affected();
        if revoked > 0 {
            tracing::warn!(
                family_id = %family_id,
                reason = reason,
                count = revoked,
                "Revoked session family"
            );
        }

        Ok(revoked)
    }

    #[instrument(skip(self))]
    async fn revoke_by_id(&self, session_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            ",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn find_active_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionModel>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW() \
             ORDER BY last_used DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self, retention: Duration) -> RepoResult<u64> {
        // Rows are kept for a retention grace past expiry/revocation so they
        // keep serving replay detection before disappearing.
        let cutoff = Utc::now() - retention;
        let result = sqlx::query(
            r"
            DELETE FROM sessions
            WHERE expires_at < $1
               OR (revoked_at IS NOT NULL AND revoked_at < $1)
            ",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        let removed = result.rows_affected();
        tracing::info!(count = removed, "Cleaned up expired sessions");

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgSessionRepository>();
    }
}
