//! # gate-common
//!
//! Shared utilities including configuration, error handling, token and CSRF
//! management, password hashing, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{
    constant_time_eq, hash_password, validate_password_strength, verify_password, AccessClaims,
    CsrfManager, MintedToken, RefreshClaims, TokenManager,
};
pub use config::{
    AbuseConfig, AppConfig, AppSettings, CaptchaConfig, ConfigError, CorsConfig, CsrfConfig,
    DatabaseConfig, EmailConfig, Environment, JwtConfig, MagicLinkConfig, RateLimitConfig,
    RedisConfig, ServerConfig, SessionConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
