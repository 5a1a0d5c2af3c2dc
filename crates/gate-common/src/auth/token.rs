//! Access/refresh token minting and verification
//!
//! Stateless JWTs signed with HS256 via the `jsonwebtoken` crate. Verification
//! is a pure in-memory operation - no I/O belongs in this module; revocation
//! and replay checks are the session store's job.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;

/// Claim set carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl AccessClaims {
    /// Get the subject as a user ID
    ///
    /// # Errors
    /// Returns an error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

/// Claim set carried by refresh tokens. The `jti` is what the session store
/// tracks as `current_jti` and rotates on every use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl RefreshClaims {
    /// Get the user ID as a UUID
    ///
    /// # Errors
    /// Returns an error if the claim is not a valid UUID
    pub fn user_uuid(&self) -> Result<Uuid, AppError> {
        self.user_id.parse().map_err(|_| AppError::InvalidToken)
    }
}

/// A freshly minted token with its metadata
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub ttl_seconds: i64,
    pub jti: String,
}

/// Token manager for minting and verifying JWTs
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: i64,
    refresh_token_ttl: i64,
    remember_me_refresh_ttl: i64,
    leeway: u64,
}

const REFRESH_TOKEN_TYPE: &str = "refresh";

impl TokenManager {
    /// Create a new token manager
    #[must_use]
    pub fn new(
        secret: &str,
        access_token_ttl: i64,
        refresh_token_ttl: i64,
        remember_me_refresh_ttl: i64,
        leeway: u64,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_ttl,
            refresh_token_ttl,
            remember_me_refresh_ttl,
            leeway,
        }
    }

    /// Create a token manager from application configuration
    #[must_use]
    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
            config.remember_me_refresh_ttl,
            config.leeway,
        )
    }

    /// Mint a signed access token for a user
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn mint_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &[String],
    ) -> Result<MintedToken, AppError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_ttl)).timestamp(),
            jti: jti.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode access token")))?;

        Ok(MintedToken {
            token,
            ttl_seconds: self.access_token_ttl,
            jti,
        })
    }

    /// Mint a signed refresh token. `remember_me` selects the long TTL.
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn mint_refresh_token(
        &self,
        user_id: Uuid,
        remember_me: bool,
    ) -> Result<MintedToken, AppError> {
        let ttl = if remember_me {
            self.remember_me_refresh_ttl
        } else {
            self.refresh_token_ttl
        };
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let claims = RefreshClaims {
            user_id: user_id.to_string(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl)).timestamp(),
            jti: jti.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode refresh token")))?;

        Ok(MintedToken {
            token,
            ttl_seconds: ttl,
            jti,
        })
    }

    /// Verify signature and expiry of an access token.
    ///
    /// Returns `None` on any validation failure; callers choose the
    /// HTTP-level response.
    #[must_use]
    pub fn verify_access_token(&self, token: &str) -> Option<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .ok()
    }

    /// Verify signature, expiry, and `type` claim of a refresh token.
    ///
    /// Returns `None` on any validation failure, including an access token
    /// presented where a refresh token belongs.
    #[must_use]
    pub fn verify_refresh_token(&self, token: &str) -> Option<RefreshClaims> {
        let claims = decode::<RefreshClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .ok()?;

        if claims.token_type != REFRESH_TOKEN_TYPE {
            return None;
        }
        Some(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway;
        validation
    }

    // ------------------------------------------------------------------
    // Cheap extraction helpers. These decode claims WITHOUT verifying the
    // signature and are only for use after an upstream verification (or for
    // logging/diagnostics); they must stay free of crypto work.
    // ------------------------------------------------------------------

    /// Decode the raw claim set without signature verification
    #[must_use]
    pub fn get_token_claims(token: &str) -> Option<serde_json::Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<serde_json::Value>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Extract the `jti` claim without signature verification
    #[must_use]
    pub fn extract_jti(token: &str) -> Option<String> {
        Self::get_token_claims(token)?
            .get("jti")?
            .as_str()
            .map(String::from)
    }

    /// Extract the user ID (`sub` or `user_id`) without signature verification
    #[must_use]
    pub fn extract_user_id(token: &str) -> Option<Uuid> {
        let claims = Self::get_token_claims(token)?;
        let raw = claims
            .get("sub")
            .or_else(|| claims.get("user_id"))?
            .as_str()?;
        raw.parse().ok()
    }

    /// Check the `exp` claim against the current time, without signature
    /// verification and without leeway
    #[must_use]
    pub fn is_token_expired(token: &str) -> bool {
        match Self::get_token_claims(token).and_then(|c| c.get("exp")?.as_i64()) {
            Some(exp) => exp <= Utc::now().timestamp(),
            None => true,
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("remember_me_refresh_ttl", &self.remember_me_refresh_ttl)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-that-is-long-enough";

    fn create_test_manager() -> TokenManager {
        TokenManager::new(TEST_SECRET, 3600, 604_800, 2_592_000, 30)
    }

    fn encode_with(claims: &impl Serialize) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_mint_and_verify_access_token() {
        let manager = create_test_manager();
        let user_id = Uuid::new_v4();
        let roles = vec!["user".to_string(), "moderator".to_string()];

        let minted = manager
            .mint_access_token(user_id, "a@example.com", &roles)
            .unwrap();
        assert_eq!(minted.ttl_seconds, 3600);

        let claims = manager.verify_access_token(&minted.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.jti, minted.jti);
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_mint_and_verify_refresh_token() {
        let manager = create_test_manager();
        let user_id = Uuid::new_v4();

        let minted = manager.mint_refresh_token(user_id, false).unwrap();
        assert_eq!(minted.ttl_seconds, 604_800);

        let claims = manager.verify_refresh_token(&minted.token).unwrap();
        assert_eq!(claims.user_id, user_id.to_string());
        assert_eq!(claims.token_type, "refresh");
        assert_eq!(claims.jti, minted.jti);
    }

    #[test]
    fn test_remember_me_selects_long_ttl() {
        let manager = create_test_manager();
        let minted = manager.mint_refresh_token(Uuid::new_v4(), true).unwrap();
        assert_eq!(minted.ttl_seconds, 2_592_000);
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let manager = create_test_manager();
        let minted = manager
            .mint_access_token(Uuid::new_v4(), "a@example.com", &["user".to_string()])
            .unwrap();
        assert!(manager.verify_refresh_token(&minted.token).is_none());
    }

    #[test]
    fn test_expired_token_returns_none() {
        let manager = create_test_manager();
        let now = Utc::now();
        // Expired well past the 30s leeway
        let claims = RefreshClaims {
            user_id: Uuid::new_v4().to_string(),
            token_type: "refresh".to_string(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode_with(&claims);

        assert!(manager.verify_refresh_token(&token).is_none());
        assert!(TokenManager::is_token_expired(&token));
    }

    #[test]
    fn test_leeway_tolerates_slight_skew() {
        let manager = create_test_manager();
        let now = Utc::now();
        // Expired 5 seconds ago, within the 30s leeway
        let claims = RefreshClaims {
            user_id: Uuid::new_v4().to_string(),
            token_type: "refresh".to_string(),
            iat: (now - Duration::hours(1)).timestamp(),
            exp: (now - Duration::seconds(5)).timestamp(),
            jti: "leeway-jti".to_string(),
        };
        let token = encode_with(&claims);

        assert!(manager.verify_refresh_token(&token).is_some());
    }

    #[test]
    fn test_tampered_token_returns_none() {
        let manager = create_test_manager();
        let minted = manager
            .mint_access_token(Uuid::new_v4(), "a@example.com", &[])
            .unwrap();

        let mut tampered = minted.token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(manager.verify_access_token(&tampered).is_none());

        let other = TokenManager::new("different-secret", 3600, 604_800, 2_592_000, 30);
        assert!(other.verify_access_token(&minted.token).is_none());
    }

    #[test]
    fn test_garbage_input_returns_none() {
        let manager = create_test_manager();
        assert!(manager.verify_access_token("not.a.jwt").is_none());
        assert!(manager.verify_refresh_token("").is_none());
        assert!(TokenManager::get_token_claims("garbage").is_none());
    }

    #[test]
    fn test_extract_helpers() {
        let manager = create_test_manager();
        let user_id = Uuid::new_v4();

        let access = manager
            .mint_access_token(user_id, "a@example.com", &[])
            .unwrap();
        assert_eq!(TokenManager::extract_jti(&access.token).unwrap(), access.jti);
        assert_eq!(
            TokenManager::extract_user_id(&access.token).unwrap(),
            user_id
        );
        assert!(!TokenManager::is_token_expired(&access.token));

        let refresh = manager.mint_refresh_token(user_id, false).unwrap();
        assert_eq!(
            TokenManager::extract_user_id(&refresh.token).unwrap(),
            user_id
        );
    }
}
