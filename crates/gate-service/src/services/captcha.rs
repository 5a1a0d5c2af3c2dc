//! CAPTCHA verification against an external provider
//!
//! Exactly one provider (Cloudflare Turnstile or Google reCAPTCHA) is active
//! per deployment, selected by which secret is configured. When the feature
//! is administratively disabled, verification always succeeds.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};

use gate_common::{AppError, AppResult, CaptchaConfig};

const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Verifier for CAPTCHA response tokens
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns the provider's verdict for the response token
    async fn verify(&self, response_token: &str, remote_ip: Option<&str>) -> AppResult<bool>;
}

/// Verifier used when CAPTCHA is disabled: always passes
#[derive(Debug, Clone, Default)]
pub struct DisabledCaptcha;

#[async_trait]
impl CaptchaVerifier for DisabledCaptcha {
    async fn verify(&self, _response_token: &str, _remote_ip: Option<&str>) -> AppResult<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone)]
enum Provider {
    Turnstile { secret: String },
    Recaptcha { secret: String },
}

impl Provider {
    fn endpoint(&self) -> &'static str {
        match self {
            Self::Turnstile { .. } => TURNSTILE_VERIFY_URL,
            Self::Recaptcha { .. } => RECAPTCHA_VERIFY_URL,
        }
    }

    fn secret(&self) -> &str {
        match self {
            Self::Turnstile { secret } | Self::Recaptcha { secret } => secret,
        }
    }
}

/// Shape shared by both providers' siteverify responses
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// HTTPS verifier calling the configured provider's siteverify endpoint
pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    provider: Provider,
}

impl HttpCaptchaVerifier {
    /// Build the verifier for the configured provider, or the disabled
    /// verifier when no provider is active
    pub fn from_config(config: &CaptchaConfig) -> Arc<dyn CaptchaVerifier> {
        if !config.is_active() {
            return Arc::new(DisabledCaptcha);
        }

        let provider = if let Some(secret) = &config.turnstile_secret {
            Provider::Turnstile {
                secret: secret.clone(),
            }
        } else if let Some(secret) = &config.recaptcha_secret {
            Provider::Recaptcha {
                secret: secret.clone(),
            }
        } else {
            return Arc::new(DisabledCaptcha);
        };

        Arc::new(Self {
            client: reqwest::Client::new(),
            provider,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for HttpCaptchaVerifier {
    #[instrument(skip(self, response_token))]
    async fn verify(&self, response_token: &str, remote_ip: Option<&str>) -> AppResult<bool> {
        let mut form = vec![
            ("secret", self.provider.secret().to_string()),
            ("response", response_token.to_string()),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let response = self
            .client
            .post(self.provider.endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("CAPTCHA provider: {e}")))?;

        let verdict: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("CAPTCHA provider: {e}")))?;

        if !verdict.success && !verdict.error_codes.is_empty() {
            warn!(error_codes = ?verdict.error_codes, "CAPTCHA verification rejected");
        }

        Ok(verdict.success)
    }
}

impl std::fmt::Debug for HttpCaptchaVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.provider {
            Provider::Turnstile { .. } => "turnstile",
            Provider::Recaptcha { .. } => "recaptcha",
        };
        f.debug_struct("HttpCaptchaVerifier")
            .field("provider", &name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_captcha_always_passes() {
        let verifier = DisabledCaptcha;
        assert!(verifier.verify("anything", None).await.unwrap());
        assert!(verifier.verify("", Some("203.0.113.9")).await.unwrap());
    }

    #[test]
    fn test_from_config_selects_disabled_without_secrets() {
        let config = CaptchaConfig {
            turnstile_secret: None,
            recaptcha_secret: None,
            enabled: true,
        };
        // No provider configured: verification must not block logins
        let verifier = HttpCaptchaVerifier::from_config(&config);
        let verdict = futures_executor(verifier.verify("token", None));
        assert!(verdict.unwrap());
    }

    #[test]
    fn test_provider_endpoints() {
        let turnstile = Provider::Turnstile {
            secret: "s".to_string(),
        };
        assert!(turnstile.endpoint().contains("challenges.cloudflare.com"));

        let recaptcha = Provider::Recaptcha {
            secret: "s".to_string(),
        };
        assert!(recaptcha.endpoint().contains("google.com/recaptcha"));
    }

    fn futures_executor<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
