//! # gate-service
//!
//! Application layer containing the authentication business logic: login,
//! registration, refresh-token rotation with replay handling, magic links,
//! and abuse control.

pub mod dto;
pub mod services;

// Re-export commonly used request types
pub use dto::{
    AuthResponse, ClientInfo, CurrentUserResponse, LoginGate, LoginRequest, LogoutRequest,
    MagicLinkConsumeRequest, MagicLinkRequest, RefreshTokenRequest, RegisterRequest,
    SessionResponse,
};

// Re-export services
pub use services::{
    AbuseControlService, AuthService, CaptchaVerifier, DisabledCaptcha, HttpCaptchaVerifier,
    MagicLinkService, Mailer, NoopMailer, ServiceContext, ServiceContextBuilder, ServiceError,
    ServiceResult, SmtpMailer,
};
