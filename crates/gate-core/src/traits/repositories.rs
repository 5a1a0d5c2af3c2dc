//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation. Every mutating session/link operation is
//! specified as a single atomic statement on the storage side; callers must
//! never emulate them with read-then-write sequences.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::entities::{MagicLink, Session, User};
use crate::error::DomainError;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    /// Find user by normalized email
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Check if email is already taken
    async fn email_exists(&self, email: &str) -> RepoResult<bool>;

    /// Create a new user. `password_hash` is `None` for passwordless
    /// (magic-link-only) accounts.
    async fn create(&self, user: &User, password_hash: Option<&str>) -> RepoResult<()>;

    /// Find the user for an email, creating a passwordless account if none
    /// exists yet (magic-link first contact)
    async fn create_or_find_by_email(&self, email: &str) -> RepoResult<User>;

    /// Get password hash for authentication
    async fn get_password_hash(&self, id: Uuid) -> RepoResult<Option<String>>;

    /// Update password hash
    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<()>;

    /// Flag the user's email as verified
    async fn mark_email_verified(&self, id: Uuid) -> RepoResult<()>;
}

// ============================================================================
// Session Repository (SessionStore + ReplayDetector)
// ============================================================================

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a session row for a fresh login
    async fn create(&self, session: &Session) -> RepoResult<()>;

    /// Look up the row currently owning this refresh-token JTI
    async fn find_by_current_jti(&self, jti: &str) -> RepoResult<Option<Session>>;

    /// Atomically rotate `old_jti` to `new_jti` within a family.
    ///
    /// Implemented as a single guarded UPDATE matching
    /// `current_jti = old_jti AND revoked_at IS NULL AND expires_at > now()`.
    /// Returns `false` when zero rows matched - the caller must treat that as
    /// a possible replay, not a plain not-found.
    async fn rotate_token(
        &self,
        family_id: Uuid,
        old_jti: &str,
        new_jti: &str,
        new_expires_at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Find the row that rotated away from `jti`, i.e. whose `reused_jti_of`
    /// matches it. A hit is the replay signature: the presented token was
    /// already consumed by an earlier rotation of that family.
    async fn find_by_reused_jti(&self, jti: &str) -> RepoResult<Option<Session>>;

    /// Set `revoked_at` on every non-revoked row of the family. Idempotent;
    /// returns the number of rows newly revoked.
    async fn revoke_family(&self, family_id: Uuid, reason: &str) -> RepoResult<u64>;

    /// Revoke a single session row (targeted logout)
    async fn revoke_by_id(&self, session_id: Uuid) -> RepoResult<bool>;

    /// Active (non-revoked, non-expired) sessions for the account page
    async fn find_active_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Session>>;

    /// Delete rows whose `expires_at` is older than `now - retention`.
    /// The retention grace keeps recently expired rows available for replay
    /// detection. Returns rows removed.
    async fn cleanup_expired(&self, retention: Duration) -> RepoResult<u64>;
}

// ============================================================================
// Magic Link Repository
// ============================================================================

/// Outcome of an atomic consumption attempt.
///
/// Exactly one concurrent caller may observe `Consumed` for a given link; every
/// later caller observes `AlreadyUsed`, which is a distinct failure rather than
/// a generic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicLinkConsumeOutcome {
    Consumed(MagicLink),
    AlreadyUsed,
    Expired,
    HashMismatch,
    NotFound,
}

#[async_trait]
pub trait MagicLinkRepository: Send + Sync {
    /// Persist a freshly issued link (hash only, never the raw token)
    async fn create(&self, link: &MagicLink) -> RepoResult<()>;

    /// Consume a link under a row lock: verify pending + hash match, then flip
    /// the used flag with a guarded UPDATE so one concurrent winner exists.
    async fn consume(&self, id: Uuid, token_hash: &str) -> RepoResult<MagicLinkConsumeOutcome>;

    /// Invalidate all other pending links for the email (one-link-wins).
    /// Returns the number of siblings invalidated.
    async fn invalidate_pending_for_email(&self, email: &str, except: Uuid) -> RepoResult<u64>;

    /// Links issued to this email since `since` (issuance throttling)
    async fn count_recent_for_email(&self, email: &str, since: DateTime<Utc>) -> RepoResult<i64>;

    /// Links issued from this IP since `since` (issuance throttling)
    async fn count_recent_for_ip(&self, ip: &str, since: DateTime<Utc>) -> RepoResult<i64>;
}
