//! Login abuse control
//!
//! Failed-attempt gating with a CAPTCHA tier and exponential backoff. The
//! counters live in Redis (see `gate_cache::AbuseStore`); when that store is
//! unreachable the gate fails OPEN - locking every user out because a cache
//! died is the worse failure mode. That tradeoff is deliberate and must be
//! revisited per deployment risk appetite, not silently inverted.

use tracing::{instrument, warn};

use gate_cache::AbuseState;
use gate_common::{AbuseConfig, AppError};

use crate::dto::LoginGate;

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Abuse-control service gating login attempts
pub struct AbuseControlService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AbuseControlService<'a> {
    /// Create a new AbuseControlService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn config(&self) -> &AbuseConfig {
        &self.ctx.config().abuse
    }

    /// Evaluate the gate for a login attempt on `username`.
    ///
    /// Below the CAPTCHA threshold the attempt is allowed; at or above it a
    /// CAPTCHA is demanded; at or above the attempt cap the account is
    /// blocked until the backoff window has elapsed.
    #[instrument(skip(self, username))]
    pub async fn check_login_abuse(&self, username: &str) -> ServiceResult<LoginGate> {
        let config = self.config();

        let state = match self.ctx.abuse_store().get_state(username).await {
            Ok(state) => state,
            Err(e) => {
                // Fail open: allow the attempt, log the degradation.
                warn!(error = %e, "Abuse store unreachable; failing open");
                return Ok(LoginGate::open(config.max_attempts));
            }
        };

        Ok(self.evaluate(&state))
    }

    fn evaluate(&self, state: &AbuseState) -> LoginGate {
        let config = self.config();
        let attempts = state.attempts;
        let attempts_remaining = config.max_attempts.saturating_sub(attempts as u32);

        if attempts >= u64::from(config.max_attempts) {
            let backoff = self.calculate_backoff(attempts);
            let elapsed = state
                .last_attempt
                .map(|t| (chrono::Utc::now().timestamp() - t).max(0) as u64);

            let remaining = match elapsed {
                Some(elapsed) if elapsed >= backoff => 0,
                Some(elapsed) => backoff - elapsed,
                None => backoff,
            };

            if remaining > 0 {
                return LoginGate {
                    allowed: false,
                    requires_captcha: true,
                    backoff_seconds: remaining,
                    attempts_remaining: 0,
                    message: Some(format!(
                        "Too many failed attempts. Try again in {remaining} seconds."
                    )),
                };
            }

            // Backoff served: allow another attempt, still CAPTCHA-gated.
            return LoginGate {
                allowed: true,
                requires_captcha: true,
                backoff_seconds: 0,
                attempts_remaining: 0,
                message: None,
            };
        }

        if attempts >= u64::from(config.captcha_threshold) || state.captcha_required {
            return LoginGate {
                allowed: true,
                requires_captcha: true,
                backoff_seconds: 0,
                attempts_remaining,
                message: Some("CAPTCHA verification required".to_string()),
            };
        }

        LoginGate::open(attempts_remaining)
    }

    /// Backoff in seconds for a given failed-attempt count:
    /// 0 for at most one attempt, then base·2^(n−2) capped at the maximum
    /// (5min, 10min, 20min, ... up to 60min with the defaults).
    #[must_use]
    pub fn calculate_backoff(&self, attempts: u64) -> u64 {
        let config = self.config();
        if attempts <= 1 {
            return 0;
        }
        // Cap the exponent so the shift cannot overflow; the ceiling takes
        // over long before that anyway.
        let exponent = (attempts - 2).min(20) as u32;
        config
            .base_backoff_seconds
            .saturating_mul(1u64 << exponent)
            .min(config.max_backoff_seconds)
    }

    /// Record a failed login: bump the counter and set the CAPTCHA flag once
    /// the threshold is crossed. Fails open on store errors.
    #[instrument(skip(self, username), fields(ip = ip))]
    pub async fn record_failed_login(&self, username: &str, ip: &str) -> ServiceResult<u64> {
        let store = self.ctx.abuse_store();
        let attempts = match store.record_failure(username).await {
            Ok(attempts) => attempts,
            Err(e) => {
                warn!(error = %e, "Abuse store unreachable; failed attempt not recorded");
                return Ok(0);
            }
        };

        if attempts >= u64::from(self.config().captcha_threshold) {
            if let Err(e) = store.set_captcha_required(username).await {
                warn!(error = %e, "Abuse store unreachable; captcha flag not set");
            }
        }

        Ok(attempts)
    }

    /// Clear all abuse state after a successful login. Fails open.
    #[instrument(skip(self, username), fields(ip = ip))]
    pub async fn record_successful_login(&self, username: &str, ip: &str) -> ServiceResult<()> {
        if let Err(e) = self.ctx.abuse_store().clear(username).await {
            warn!(error = %e, "Abuse store unreachable; abuse state not cleared");
        }
        Ok(())
    }

    /// Verify a CAPTCHA response token when the gate demands one.
    ///
    /// # Errors
    /// `CaptchaRequired` when no token was supplied, `CaptchaFailed` when the
    /// provider rejects it.
    #[instrument(skip(self, response_token))]
    pub async fn verify_captcha(
        &self,
        response_token: Option<&str>,
        ip: Option<&str>,
    ) -> ServiceResult<()> {
        if !self.ctx.config().captcha.is_active() {
            return Ok(());
        }

        let token = response_token.ok_or(ServiceError::App(AppError::CaptchaRequired))?;
        let passed = self
            .ctx
            .captcha()
            .verify(token, ip)
            .await
            .map_err(ServiceError::from)?;

        if !passed {
            return Err(ServiceError::App(AppError::CaptchaFailed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::test_context;

    fn state(attempts: u64, captcha: bool, last_attempt: Option<i64>) -> AbuseState {
        AbuseState {
            attempts,
            captcha_required: captcha,
            last_attempt,
        }
    }

    #[tokio::test]
    async fn test_backoff_table() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);

        assert_eq!(service.calculate_backoff(0), 0);
        assert_eq!(service.calculate_backoff(1), 0);
        assert_eq!(service.calculate_backoff(2), 300);
        assert_eq!(service.calculate_backoff(3), 600);
        assert_eq!(service.calculate_backoff(4), 1200);
        assert_eq!(service.calculate_backoff(5), 2400);
        assert_eq!(service.calculate_backoff(10), 3600);
        // Huge counts stay at the ceiling instead of overflowing
        assert_eq!(service.calculate_backoff(1000), 3600);
    }

    #[tokio::test]
    async fn test_gate_tiers() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);
        let now = chrono::Utc::now().timestamp();

        // Attempts 0-2: open
        let gate = service.evaluate(&state(0, false, None));
        assert!(gate.allowed);
        assert!(!gate.requires_captcha);
        assert_eq!(gate.attempts_remaining, 5);

        let gate = service.evaluate(&state(2, false, Some(now)));
        assert!(gate.allowed);
        assert!(!gate.requires_captcha);

        // At the CAPTCHA threshold
        let gate = service.evaluate(&state(3, true, Some(now)));
        assert!(gate.allowed);
        assert!(gate.requires_captcha);
        assert_eq!(gate.backoff_seconds, 0);

        // At the cap: blocked with a live backoff window
        let gate = service.evaluate(&state(5, true, Some(now)));
        assert!(!gate.allowed);
        assert!(gate.requires_captcha);
        assert!(gate.backoff_seconds > 0);
        assert_eq!(gate.attempts_remaining, 0);
        assert!(gate.message.is_some());
    }

    #[tokio::test]
    async fn test_served_backoff_reopens_with_captcha() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);

        // 5 attempts => 2400s backoff; last attempt an hour ago
        let long_ago = chrono::Utc::now().timestamp() - 3600;
        let gate = service.evaluate(&state(5, true, Some(long_ago)));
        assert!(gate.allowed);
        assert!(gate.requires_captcha);
        assert_eq!(gate.backoff_seconds, 0);
    }

    #[tokio::test]
    async fn test_sticky_captcha_flag_below_threshold() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);

        // Counter may have expired while the flag is still set
        let gate = service.evaluate(&state(0, true, None));
        assert!(gate.allowed);
        assert!(gate.requires_captcha);
    }

    #[tokio::test]
    async fn test_gate_fails_open_when_store_unreachable() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);

        // The test context's Redis pool points at a closed port.
        let gate = service.check_login_abuse("alice@example.com").await.unwrap();
        assert!(gate.allowed);
        assert!(!gate.requires_captcha);

        // Recording paths swallow the outage too.
        let attempts = service
            .record_failed_login("alice@example.com", "203.0.113.9")
            .await
            .unwrap();
        assert_eq!(attempts, 0);
        service
            .record_successful_login("alice@example.com", "203.0.113.9")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_captcha_skipped_when_disabled() {
        let ctx = test_context();
        let service = AbuseControlService::new(&ctx);

        // Disabled CAPTCHA config: no token needed
        service.verify_captcha(None, None).await.unwrap();
        service
            .verify_captcha(Some("anything"), Some("203.0.113.9"))
            .await
            .unwrap();
    }
}
