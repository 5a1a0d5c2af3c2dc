//! Business logic services
//!
//! Orchestration of the authentication flows: login/registration, refresh
//! rotation with replay escalation, magic links, and abuse control.

pub mod abuse;
pub mod auth;
pub mod captcha;
pub mod context;
pub mod error;
pub mod magic_link;
pub mod mailer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export all services for convenience
pub use abuse::AbuseControlService;
pub use auth::AuthService;
pub use captcha::{CaptchaVerifier, DisabledCaptcha, HttpCaptchaVerifier};
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use magic_link::MagicLinkService;
pub use mailer::{Mailer, NoopMailer, SmtpMailer};
