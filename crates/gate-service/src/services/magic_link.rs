//! Single-use magic-link sign-in
//!
//! A link token is `{link_id}.{issued_at}.{signature}` where the signature is
//! an HMAC over id, timestamp, and email under a dedicated secret. Only a
//! SHA-256 hash of the full token is persisted; the raw token exists solely
//! inside the email. Consumption verifies the HMAC before touching storage,
//! then rides the repository's single-winner flip. The first successful
//! consumption invalidates every other pending link for the email.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use gate_common::{constant_time_eq, AppError};
use gate_core::entities::{MagicLink, User};
use gate_core::traits::MagicLinkConsumeOutcome;
use gate_core::DomainError;

use crate::dto::{AuthResponse, ClientInfo, MagicLinkConsumeRequest, MagicLinkRequest};

use super::auth::AuthService;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

type HmacSha256 = Hmac<Sha256>;

/// Magic-link issuance and consumption
pub struct MagicLinkService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MagicLinkService<'a> {
    /// Create a new MagicLinkService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Issue a link and dispatch it by email.
    ///
    /// Enforces per-email and per-IP hourly issuance limits. Callers at the
    /// HTTP boundary answer identically whether or not anything was sent, to
    /// keep account existence and throttling unobservable.
    #[instrument(skip(self, request, client), fields(ip = %client.ip))]
    pub async fn create_and_send_magic_link(
        &self,
        request: MagicLinkRequest,
        client: &ClientInfo,
    ) -> ServiceResult<()> {
        let email = User::normalize_email(&request.email);
        let config = &self.ctx.config().magic_link;
        let since = Utc::now() - Duration::hours(1);

        let by_email = self
            .ctx
            .magic_link_repo()
            .count_recent_for_email(&email, since)
            .await?;
        if by_email >= config.per_email_hourly_limit {
            warn!("Magic-link issuance limit reached for email");
            return Err(ServiceError::App(AppError::RateLimited {
                retry_after_seconds: 3600,
            }));
        }

        let by_ip = self
            .ctx
            .magic_link_repo()
            .count_recent_for_ip(&client.ip, since)
            .await?;
        if by_ip >= config.per_ip_hourly_limit {
            warn!("Magic-link issuance limit reached for IP");
            return Err(ServiceError::App(AppError::RateLimited {
                retry_after_seconds: 3600,
            }));
        }

        let user = self.ctx.user_repo().create_or_find_by_email(&email).await?;

        let link_id = Uuid::new_v4();
        let issued_at = Utc::now();
        let token = self.build_token(link_id, issued_at, &email);
        let link = MagicLink::new(
            link_id,
            email.clone(),
            token_hash(&token),
            client.ip.clone(),
            issued_at + Duration::minutes(config.ttl_minutes),
        );
        self.ctx.magic_link_repo().create(&link).await?;

        let return_to = request.return_to.as_deref().unwrap_or("/");
        let url = format!(
            "{}?token={}&email={}&rt={}",
            config.base_url, token, email, return_to
        );
        let ttl = config.ttl_minutes;
        let text_body = format!(
            "Use this link to sign in:\n\n{url}\n\n\
             The link is valid for {ttl} minutes and can be used once.\n\
             If you did not request it, you can safely ignore this email.\n"
        );
        let html_body = format!(
            "<p>Use this link to sign in:</p>\
             <p><a href=\"{url}\">Sign in</a></p>\
             <p>The link is valid for {ttl} minutes and can be used once.<br>\
             If you did not request it, you can safely ignore this email.</p>"
        );

        self.ctx
            .mailer()
            .send_email(&email, "Your sign-in link", &html_body, &text_body)
            .await
            .map_err(ServiceError::from)?;

        info!(user_id = %user.id, link_id = %link_id, "Magic link issued");
        Ok(())
    }

    /// Redeem a link: HMAC and expiry are checked before any storage access,
    /// then the repository's row-locked flip picks exactly one winner. The
    /// winner gets a fresh session; losers get the distinct already-used
    /// failure.
    #[instrument(skip(self, request, client))]
    pub async fn consume_magic_link(
        &self,
        request: MagicLinkConsumeRequest,
        client: &ClientInfo,
    ) -> ServiceResult<AuthResponse> {
        let email = User::normalize_email(&request.email);
        let (link_id, issued_at) = self.parse_and_verify(&request.token, &email)?;

        let ttl = Duration::minutes(self.ctx.config().magic_link.ttl_minutes);
        if Utc::now() > issued_at + ttl {
            return Err(ServiceError::Domain(DomainError::MagicLinkExpired));
        }

        let outcome = self
            .ctx
            .magic_link_repo()
            .consume(link_id, &token_hash(&request.token))
            .await?;

        let link = match outcome {
            MagicLinkConsumeOutcome::Consumed(link) => link,
            MagicLinkConsumeOutcome::AlreadyUsed => {
                return Err(ServiceError::Domain(DomainError::MagicLinkAlreadyUsed));
            }
            MagicLinkConsumeOutcome::Expired => {
                return Err(ServiceError::Domain(DomainError::MagicLinkExpired));
            }
            MagicLinkConsumeOutcome::HashMismatch | MagicLinkConsumeOutcome::NotFound => {
                return Err(ServiceError::Domain(DomainError::MagicLinkInvalid));
            }
        };

        if link.email != email {
            return Err(ServiceError::Domain(DomainError::MagicLinkInvalid));
        }

        // One-link-wins: every other pending link for this email dies now.
        let invalidated = self
            .ctx
            .magic_link_repo()
            .invalidate_pending_for_email(&email, link_id)
            .await?;
        if invalidated > 0 {
            info!(count = invalidated, "Invalidated sibling magic links");
        }

        let mut user = self.ctx.user_repo().create_or_find_by_email(&email).await?;
        if !user.email_verified {
            self.ctx.user_repo().mark_email_verified(user.id).await?;
            user.email_verified = true;
        }

        info!(user_id = %user.id, link_id = %link_id, "Magic link consumed");

        // A consumed link is a strong authentication: start a fresh family.
        AuthService::new(self.ctx)
            .issue_session(&user, false, client)
            .await
    }

    /// Parse `{id}.{ts}.{sig}` and verify the signature for `email`.
    /// Every malformed shape maps to the same generic invalid-link error.
    fn parse_and_verify(
        &self,
        token: &str,
        email: &str,
    ) -> ServiceResult<(Uuid, DateTime<Utc>)> {
        let invalid = || ServiceError::Domain(DomainError::MagicLinkInvalid);

        let mut parts = token.splitn(3, '.');
        let id_part = parts.next().ok_or_else(invalid)?;
        let ts_part = parts.next().ok_or_else(invalid)?;
        let sig_part = parts.next().ok_or_else(invalid)?;

        let link_id: Uuid = id_part.parse().map_err(|_| invalid())?;
        let timestamp: i64 = ts_part.parse().map_err(|_| invalid())?;
        let issued_at = Utc
            .timestamp_opt(timestamp, 0)
            .single()
            .ok_or_else(invalid)?;

        let expected = self.sign(link_id, timestamp, email);
        if !constant_time_eq(sig_part.as_bytes(), expected.as_bytes()) {
            return Err(invalid());
        }

        Ok((link_id, issued_at))
    }

    fn build_token(&self, link_id: Uuid, issued_at: DateTime<Utc>, email: &str) -> String {
        let timestamp = issued_at.timestamp();
        let signature = self.sign(link_id, timestamp, email);
        format!("{link_id}.{timestamp}.{signature}")
    }

    fn sign(&self, link_id: Uuid, timestamp: i64, email: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.ctx.config().magic_link.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{link_id}.{timestamp}.{email}").as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// SHA-256 hex of the full signed token; the only form that reaches storage
fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::test_context;

    const EMAIL: &str = "alice@example.com";

    #[tokio::test]
    async fn test_token_roundtrip() {
        let ctx = test_context();
        let service = MagicLinkService::new(&ctx);

        let link_id = Uuid::new_v4();
        let issued_at = Utc::now();
        let token = service.build_token(link_id, issued_at, EMAIL);

        let (parsed_id, parsed_ts) = service.parse_and_verify(&token, EMAIL).unwrap();
        assert_eq!(parsed_id, link_id);
        assert_eq!(parsed_ts.timestamp(), issued_at.timestamp());
    }

    #[tokio::test]
    async fn test_tampered_signature_is_rejected_before_storage() {
        let ctx = test_context();
        let service = MagicLinkService::new(&ctx);
        let token = service.build_token(Uuid::new_v4(), Utc::now(), EMAIL);

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        // The offline context has no reachable database; rejection here
        // proves the HMAC check runs before any storage access.
        let err = service.parse_and_verify(&tampered, EMAIL).unwrap_err();
        assert_eq!(err.error_code(), "MAGIC_LINK_INVALID");
    }

    #[tokio::test]
    async fn test_wrong_email_is_rejected() {
        let ctx = test_context();
        let service = MagicLinkService::new(&ctx);
        let token = service.build_token(Uuid::new_v4(), Utc::now(), EMAIL);

        let err = service
            .parse_and_verify(&token, "mallory@example.com")
            .unwrap_err();
        assert_eq!(err.error_code(), "MAGIC_LINK_INVALID");
    }

    #[tokio::test]
    async fn test_malformed_tokens_are_rejected() {
        let ctx = test_context();
        let service = MagicLinkService::new(&ctx);

        for bad in ["", "just-one-part", "two.parts", "not-a-uuid.123.sig"] {
            let err = service.parse_and_verify(bad, EMAIL).unwrap_err();
            assert_eq!(err.error_code(), "MAGIC_LINK_INVALID", "input: {bad}");
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_before_storage() {
        let ctx = test_context();
        let service = MagicLinkService::new(&ctx);

        // Issued 21 minutes ago against a 20-minute TTL
        let issued_at = Utc::now() - Duration::minutes(21);
        let token = service.build_token(Uuid::new_v4(), issued_at, EMAIL);

        let err = service
            .consume_magic_link(
                MagicLinkConsumeRequest {
                    token,
                    email: EMAIL.to_string(),
                },
                &ClientInfo::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MAGIC_LINK_EXPIRED");
    }

    #[test]
    fn test_token_hash_is_hex_sha256() {
        let hash = token_hash("some-token");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, token_hash("some-token"));
        assert_ne!(hash, token_hash("other-token"));
    }
}
