//! PostgreSQL implementation of MagicLinkRepository
//!
//! Consumption is the one operation in the system that takes a pessimistic
//! row lock: the link row is read `FOR UPDATE` inside a transaction and the
//! used flag is flipped with a guarded UPDATE, so exactly one concurrent
//! redeemer can win and every loser sees a distinct already-used outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use gate_core::entities::MagicLink;
use gate_core::traits::{MagicLinkConsumeOutcome, MagicLinkRepository, RepoResult};

use crate::models::MagicLinkModel;

use super::error::map_db_error;

const LINK_COLUMNS: &str =
    "id, email, token_hash, expires_at, used_at, is_used, ip_address, created_at";

/// PostgreSQL implementation of MagicLinkRepository
#[derive(Clone)]
pub struct PgMagicLinkRepository {
    pool: PgPool,
}

impl PgMagicLinkRepository {
    /// Create a new PgMagicLinkRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MagicLinkRepository for PgMagicLinkRepository {
    #[instrument(skip(self, link), fields(link_id = %link.id))]
    async fn create(&self, link: &MagicLink) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO magic_links (id, email, token_hash, expires_at, used_at,
                                     is_used, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(link.id)
        .bind(&link.email)
        .bind(&link.token_hash)
        .bind(link.expires_at)
        .bind(link.used_at)
        .bind(link.is_used)
        .bind(&link.ip_address)
        .bind(link.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn consume(&self, id: Uuid, token_hash: &str) -> RepoResult<MagicLinkConsumeOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row lock serializes concurrent redeemers of the same link id.
        let row = sqlx::query_as::<_, MagicLinkModel>(&format!(
            "SELECT {LINK_COLUMNS} FROM magic_links WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let Some(row) = row else {
            return Ok(MagicLinkConsumeOutcome::NotFound);
        };

        if row.is_used {
            return Ok(MagicLinkConsumeOutcome::AlreadyUsed);
        }
        if row.is_expired() {
            return Ok(MagicLinkConsumeOutcome::Expired);
        }
        if !hash_matches(&row.token_hash, token_hash) {
            return Ok(MagicLinkConsumeOutcome::HashMismatch);
        }

        // Guarded flip: under the row lock this cannot miss, but the
        // is_used predicate keeps single-use true even without it.
        let updated = sqlx::query(
            r"
            UPDATE magic_links
            SET is_used = TRUE, used_at = NOW()
            WHERE id = $1 AND is_used = FALSE
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() == 0 {
            return Ok(MagicLinkConsumeOutcome::AlreadyUsed);
        }

        tx.commit().await.map_err(map_db_error)?;

        let mut consumed = MagicLink::from(row);
        consumed.is_used = true;
        consumed.used_at = Some(Utc::now());
        Ok(MagicLinkConsumeOutcome::Consumed(consumed))
    }

    #[instrument(skip(self))]
    async fn invalidate_pending_for_email(&self, email: &str, except: Uuid) -> RepoResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE magic_links
            SET is_used = TRUE, used_at = NOW()
            WHERE email = $1 AND id <> $2 AND is_used = FALSE
            ",
        )
        .bind(email)
        .bind(except)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn count_recent_for_email(&self, email: &str, since: DateTime<Utc>) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM magic_links WHERE email = $1 AND created_at > $2
            ",
        )
        .bind(email)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(count)
    }

    #[instrument(skip(self))]
    async fn count_recent_for_ip(&self, ip: &str, since: DateTime<Utc>) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM magic_links WHERE ip_address = $1 AND created_at > $2
            ",
        )
        .bind(ip)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(count)
    }
}

/// Constant-time comparison of the stored and presented token hashes
fn hash_matches(stored: &str, presented: &str) -> bool {
    gate_common::constant_time_eq(stored.as_bytes(), presented.as_bytes())
}
