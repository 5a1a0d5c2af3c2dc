//! Configuration structs

mod app_config;

pub use app_config::{
    AbuseConfig, AppConfig, AppSettings, CaptchaConfig, ConfigError, CorsConfig, CsrfConfig,
    DatabaseConfig, EmailConfig, Environment, JwtConfig, MagicLinkConfig, RateLimitConfig,
    RedisConfig, ServerConfig, SessionConfig,
};
