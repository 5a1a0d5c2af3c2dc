//! PostgreSQL implementation of UserRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use gate_core::entities::User;
use gate_core::error::DomainError;
use gate_core::traits::{RepoResult, UserRepository};

use crate::models::UserModel;

use super::error::{map_db_error, map_unique_violation, user_not_found};

const USER_COLUMNS: &str =
    "id, email, display_name, password_hash, roles, email_verified, created_at, updated_at";

/// PostgreSQL implementation of UserRepository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(User::from))
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(User::from))
    }

    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        let result = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)
            ",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result)
    }

    #[instrument(skip(self, password_hash))]
    async fn create(&self, user: &User, password_hash: Option<&str>) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, roles, email_verified,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(password_hash)
        .bind(&user.roles)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || DomainError::EmailAlreadyExists))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_or_find_by_email(&self, email: &str) -> RepoResult<User> {
        // Insert-if-absent without a read-then-write race; a concurrent
        // creator simply makes the insert a no-op.
        let user = User::new(Uuid::new_v4(), email.to_string());
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, roles, email_verified,
                               created_at, updated_at)
            VALUES ($1, $2, NULL, NULL, $3, FALSE, $4, $4)
            ON CONFLICT (email) DO NOTHING
            ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.roles)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.find_by_email(email)
            .await?
            .ok_or_else(|| DomainError::InternalError("created user not found".to_string()))
    }

    #[instrument(skip(self))]
    async fn get_password_hash(&self, id: Uuid) -> RepoResult<Option<String>> {
        let result = sqlx::query_scalar::<_, Option<String>>(
            r"
            SELECT password_hash FROM users WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.flatten())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_email_verified(&self, id: Uuid) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgUserRepository>();
    }
}
