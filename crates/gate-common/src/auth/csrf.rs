//! CSRF double-submit token management
//!
//! Tokens are a deterministic function of `(session_id, day_bucket, ua_hash)`
//! under a server secret: validity is recomputed, never looked up. The day
//! bucket is the UTC calendar day; validation accepts the current bucket and
//! exactly one prior bucket to tolerate the UTC-midnight rollover. That
//! one-bucket window is a signed-off product decision - do not widen it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Chars of the user-agent hash mixed into the MAC input
const UA_HASH_LEN: usize = 8;

/// CSRF token generator/validator
#[derive(Clone)]
pub struct CsrfManager {
    secret: Vec<u8>,
}

impl CsrfManager {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Generate the token for the current day bucket (~43 chars, base64url
    /// without padding)
    #[must_use]
    pub fn generate_token(&self, session_id: &str, user_agent: &str) -> String {
        self.token_for_bucket(session_id, user_agent, Self::day_bucket(Utc::now()))
    }

    /// Validate a presented token against the current and the immediately
    /// preceding day bucket.
    ///
    /// Both candidate MACs are always computed and both comparisons always
    /// run, so accepted and rejected tokens cost the same; the comparisons
    /// themselves are constant-time.
    #[must_use]
    pub fn validate_token(&self, token: &str, session_id: &str, user_agent: &str) -> bool {
        let bucket = Self::day_bucket(Utc::now());
        let current = self.token_for_bucket(session_id, user_agent, bucket);
        let previous = self.token_for_bucket(session_id, user_agent, bucket - 1);

        let matches_current = constant_time_eq(token.as_bytes(), current.as_bytes());
        let matches_previous = constant_time_eq(token.as_bytes(), previous.as_bytes());
        matches_current | matches_previous
    }

    /// UTC calendar day since the Unix epoch
    fn day_bucket(now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(86_400)
    }

    fn token_for_bucket(&self, session_id: &str, user_agent: &str, bucket: i64) -> String {
        let ua_digest = Sha256::digest(user_agent.as_bytes());
        let mut ua_hex = String::with_capacity(UA_HASH_LEN);
        for byte in ua_digest.iter().take(UA_HASH_LEN / 2) {
            ua_hex.push_str(&format!("{byte:02x}"));
        }

        let message = format!("{session_id}.{bucket}.{ua_hex}");
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for CsrfManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfManager").finish_non_exhaustive()
    }
}

/// Length-safe constant-time byte comparison
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
