//! Transactional email delivery
//!
//! SMTP transport behind a trait seam so the magic-link service never knows
//! how mail leaves the building. Template rendering beyond plain subject and
//! bodies is out of scope here.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use gate_common::{AppError, AppResult, EmailConfig};

/// Email delivery seam
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one transactional email with HTML and plain-text bodies
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> AppResult<()>;
}

/// SMTP mailer backed by lettre's async transport
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
}

impl SmtpMailer {
    /// Create a mailer from the email configuration.
    ///
    /// # Errors
    /// Returns a configuration error when SMTP settings are missing or the
    /// from address does not parse.
    pub fn from_config(config: &EmailConfig) -> AppResult<Self> {
        let host = config
            .smtp_host
            .as_ref()
            .ok_or_else(|| AppError::Config("SMTP_HOST is required".to_string()))?;

        let from_address: Mailbox = config
            .from_address
            .parse()
            .map_err(|_| AppError::Config("SMTP_FROM is not a valid email address".to_string()))?;

        let mut builder = match config.tls_mode.as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| AppError::Config(format!("SMTP TLS transport: {e}")))?,
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            // Default: STARTTLS
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| AppError::Config(format!("SMTP STARTTLS transport: {e}")))?,
        }
        .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, html_body, text_body))]
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> AppResult<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|_| AppError::Validation("Invalid recipient email address".to_string()))?;

        let email = Message::builder()
            .from(self.from_address.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;

        Ok(())
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from_address", &self.from_address.to_string())
            .finish_non_exhaustive()
    }
}

/// Mailer that only logs. Used in development and tests, and as the fallback
/// when SMTP is not configured.
#[derive(Debug, Clone, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> AppResult<()> {
        info!(to = %to, subject = %subject, "Email delivery skipped (no SMTP configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_mailer_accepts_anything() {
        let mailer = NoopMailer;
        mailer
            .send_email("a@example.com", "Subject", "<p>hi</p>", "hi")
            .await
            .unwrap();
    }

    #[test]
    fn test_smtp_mailer_requires_host() {
        let config = EmailConfig::default();
        assert!(SmtpMailer::from_config(&config).is_err());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from_address() {
        let config = EmailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            from_address: "not an address".to_string(),
            ..EmailConfig::default()
        };
        assert!(SmtpMailer::from_config(&config).is_err());
    }

    #[test]
    fn test_smtp_mailer_builds_with_full_config() {
        let config = EmailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            smtp_username: Some("user".to_string()),
            smtp_password: Some("pass".to_string()),
            from_address: "Gatehouse <no-reply@example.com>".to_string(),
            tls_mode: "starttls".to_string(),
        };
        assert!(SmtpMailer::from_config(&config).is_ok());
    }
}
