//! Failed-login counters in Redis.
//!
//! Keys are derived from a hash of the lowercased identifier - raw usernames
//! never enter the cache keyspace, so the keyspace cannot be enumerated for
//! valid accounts. Every key carries the rolling window TTL.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::pool::{RedisPool, RedisResult};

/// Key prefix for the failed-attempt counter
const USER_PREFIX: &str = "abuse:user:";

/// Key prefix for the captcha-required flag
const CAPTCHA_PREFIX: &str = "abuse:captcha:";

/// Key prefix for the last-attempt timestamp
const LAST_ATTEMPT_PREFIX: &str = "abuse:last_attempt:";

/// Hex length of the hashed identifier used in keys
const IDENTIFIER_HASH_LEN: usize = 32;

/// Snapshot of the abuse state for one identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbuseState {
    pub attempts: u64,
    pub captcha_required: bool,
    /// Unix timestamp of the most recent failed attempt
    pub last_attempt: Option<i64>,
}

/// Store for login abuse counters
#[derive(Clone)]
pub struct AbuseStore {
    pool: RedisPool,
    window_seconds: u64,
}

impl AbuseStore {
    /// Create a new abuse store with the given rolling window
    #[must_use]
    pub fn new(pool: RedisPool, window_seconds: u64) -> Self {
        Self {
            pool,
            window_seconds,
        }
    }

    /// Hash an identifier for use in cache keys
    fn hash_identifier(identifier: &str) -> String {
        let digest = Sha256::digest(identifier.trim().to_lowercase().as_bytes());
        let mut out = String::with_capacity(IDENTIFIER_HASH_LEN);
        for byte in digest.iter().take(IDENTIFIER_HASH_LEN / 2) {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    fn keys(identifier: &str) -> (String, String, String) {
        let hash = Self::hash_identifier(identifier);
        (
            format!("{USER_PREFIX}{hash}"),
            format!("{CAPTCHA_PREFIX}{hash}"),
            format!("{LAST_ATTEMPT_PREFIX}{hash}"),
        )
    }

    /// Record one failed attempt: atomically bump the counter, refresh the
    /// window, and stamp the last-attempt time. Returns the new count.
    pub async fn record_failure(&self, identifier: &str) -> RedisResult<u64> {
        let (counter_key, _, last_attempt_key) = Self::keys(identifier);

        let attempts = self
            .pool
            .incr_with_window(&counter_key, self.window_seconds)
            .await?;
        self.pool
            .set_with_ttl(
                &last_attempt_key,
                &Utc::now().timestamp().to_string(),
                self.window_seconds,
            )
            .await?;

        tracing::debug!(attempts, "Recorded failed login attempt");
        Ok(attempts)
    }

    /// Flag the identifier as requiring a CAPTCHA for the rest of the window
    pub async fn set_captcha_required(&self, identifier: &str) -> RedisResult<()> {
        let (_, captcha_key, _) = Self::keys(identifier);
        self.pool
            .set_with_ttl(&captcha_key, "1", self.window_seconds)
            .await
    }

    /// Read the current abuse state for the identifier
    pub async fn get_state(&self, identifier: &str) -> RedisResult<AbuseState> {
        let (counter_key, captcha_key, last_attempt_key) = Self::keys(identifier);

        let attempts = self.pool.get_counter(&counter_key).await?.unwrap_or(0);
        let captcha_required = self.pool.get_string(&captcha_key).await?.is_some();
        let last_attempt = self
            .pool
            .get_string(&last_attempt_key)
            .await?
            .and_then(|s| s.parse().ok());

        Ok(AbuseState {
            attempts,
            captcha_required,
            last_attempt,
        })
    }

    /// Clear all abuse state for the identifier (successful login)
    pub async fn clear(&self, identifier: &str) -> RedisResult<()> {
        let (counter_key, captcha_key, last_attempt_key) = Self::keys(identifier);
        self.pool
            .delete_many(&[&counter_key, &captcha_key, &last_attempt_key])
            .await?;
        Ok(())
    }

    /// Check if the backing store answers at all
    pub async fn health_check(&self) -> RedisResult<()> {
        self.pool.health_check().await
    }
}

impl std::fmt::Debug for AbuseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbuseStore")
            .field("window_seconds", &self.window_seconds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_hashing_hides_raw_usernames() {
        let hash = AbuseStore::hash_identifier("alice@example.com");
        assert_eq!(hash.len(), 32);
        assert!(!hash.contains('@'));
        // Case/whitespace insensitive
        assert_eq!(hash, AbuseStore::hash_identifier("  Alice@Example.COM "));
        assert_ne!(hash, AbuseStore::hash_identifier("bob@example.com"));
    }

    #[test]
    fn test_key_layout() {
        let (counter, captcha, last) = AbuseStore::keys("alice@example.com");
        let hash = AbuseStore::hash_identifier("alice@example.com");
        assert_eq!(counter, format!("abuse:user:{hash}"));
        assert_eq!(captcha, format!("abuse:captcha:{hash}"));
        assert_eq!(last, format!("abuse:last_attempt:{hash}"));
    }

    #[test]
    fn test_default_state() {
        let state = AbuseState::default();
        assert_eq!(state.attempts, 0);
        assert!(!state.captcha_required);
        assert!(state.last_attempt.is_none());
    }
}
