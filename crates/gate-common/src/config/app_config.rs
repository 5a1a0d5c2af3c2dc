//! Application configuration structs
//!
//! Loads configuration from environment variables once at bootstrap. The
//! resulting `AppConfig` is immutable and passed through the service context;
//! business code never reads the environment directly.

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub csrf: CsrfConfig,
    pub magic_link: MagicLinkConfig,
    pub abuse: AbuseConfig,
    pub captcha: CaptchaConfig,
    pub email: EmailConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Access-token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: i64,
    /// Refresh-token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: i64,
    /// Refresh-token lifetime when the client asked to be remembered
    #[serde(default = "default_remember_me_refresh_ttl")]
    pub remember_me_refresh_ttl: i64,
    /// Clock-skew leeway applied during verification, in seconds
    #[serde(default = "default_jwt_leeway")]
    pub leeway: u64,
}

/// CSRF double-submit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    pub secret: String,
    /// Cookie Domain attribute in production; host-only elsewhere
    #[serde(default)]
    pub cookie_domain: Option<String>,
}

/// Magic-link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkConfig {
    pub secret: String,
    /// Base URL the signed token is appended to
    #[serde(default = "default_magic_link_base_url")]
    pub base_url: String,
    #[serde(default = "default_magic_link_ttl_minutes")]
    pub ttl_minutes: i64,
    #[serde(default = "default_per_email_hourly_limit")]
    pub per_email_hourly_limit: i64,
    #[serde(default = "default_per_ip_hourly_limit")]
    pub per_ip_hourly_limit: i64,
}

/// Login abuse-control configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AbuseConfig {
    /// Failed attempts at/after which a CAPTCHA is demanded
    #[serde(default = "default_captcha_threshold")]
    pub captcha_threshold: u32,
    /// Failed attempts at/after which logins are blocked with backoff
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Rolling counter window in seconds
    #[serde(default = "default_abuse_window")]
    pub window_seconds: u64,
    /// First backoff step in seconds
    #[serde(default = "default_base_backoff")]
    pub base_backoff_seconds: u64,
    /// Backoff ceiling in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
}

/// CAPTCHA provider configuration. At most one provider secret may be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default)]
    pub turnstile_secret: Option<String>,
    #[serde(default)]
    pub recaptcha_secret: Option<String>,
    /// Administrative kill switch; when false, verification always succeeds
    #[serde(default = "default_captcha_enabled")]
    pub enabled: bool,
}

impl CaptchaConfig {
    /// Whether any provider is configured and the feature is on
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && (self.turnstile_secret.is_some() || self.recaptcha_secret.is_some())
    }
}

/// SMTP email configuration. All fields optional; an unset host selects the
/// no-op mailer (development).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_email_from")]
    pub from_address: String,
    /// One of "starttls", "tls", "none"
    #[serde(default = "default_smtp_tls")]
    pub tls_mode: String,
}

impl EmailConfig {
    #[must_use]
    pub fn has_smtp(&self) -> bool {
        self.smtp_host.is_some()
    }
}

/// Session retention configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Days an expired/revoked row is kept before cleanup may delete it;
    /// the grace keeps recently expired rows serving replay detection
    #[serde(default = "default_cleanup_retention_days")]
    pub cleanup_retention_days: i64,
}

/// Transport-level rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

// Default value functions
fn default_app_name() -> String {
    "gatehouse".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_access_token_ttl() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_ttl() -> i64 {
    604_800 // 7 days
}

fn default_remember_me_refresh_ttl() -> i64 {
    2_592_000 // 30 days
}

fn default_jwt_leeway() -> u64 {
    30
}

fn default_magic_link_base_url() -> String {
    "http://localhost:3000/auth/magic".to_string()
}

fn default_magic_link_ttl_minutes() -> i64 {
    20
}

fn default_per_email_hourly_limit() -> i64 {
    5
}

fn default_per_ip_hourly_limit() -> i64 {
    20
}

fn default_captcha_threshold() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    5
}

fn default_abuse_window() -> u64 {
    3600
}

fn default_base_backoff() -> u64 {
    300
}

fn default_max_backoff() -> u64 {
    3600
}

fn default_captcha_enabled() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_smtp_tls() -> String {
    "starttls".to_string()
}

fn default_cleanup_retention_days() -> i64 {
    30
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_burst() -> u32 {
    50
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or if
    /// both CAPTCHA provider secrets are configured at once
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let captcha = CaptchaConfig {
            turnstile_secret: env::var("TURNSTILE_SECRET").ok(),
            recaptcha_secret: env::var("RECAPTCHA_SECRET").ok(),
            enabled: env_parsed("CAPTCHA_ENABLED").unwrap_or_else(default_captcha_enabled),
        };
        if captcha.turnstile_secret.is_some() && captcha.recaptcha_secret.is_some() {
            return Err(ConfigError::InvalidValue(
                "TURNSTILE_SECRET/RECAPTCHA_SECRET",
                "at most one CAPTCHA provider may be configured".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| default_host()),
                port: env_parsed("API_PORT").ok_or(ConfigError::MissingVar("API_PORT"))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?,
                max_connections: env_parsed("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(default_max_connections),
                min_connections: env_parsed("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(default_min_connections),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: env_parsed("REDIS_MAX_CONNECTIONS")
                    .unwrap_or_else(default_redis_max_connections),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?,
                access_token_ttl: env_parsed("JWT_ACCESS_TOKEN_TTL")
                    .unwrap_or_else(default_access_token_ttl),
                refresh_token_ttl: env_parsed("JWT_REFRESH_TOKEN_TTL")
                    .unwrap_or_else(default_refresh_token_ttl),
                remember_me_refresh_ttl: env_parsed("JWT_REMEMBER_ME_REFRESH_TTL")
                    .unwrap_or_else(default_remember_me_refresh_ttl),
                leeway: env_parsed("JWT_LEEWAY").unwrap_or_else(default_jwt_leeway),
            },
            csrf: CsrfConfig {
                secret: env::var("CSRF_SECRET")
                    .map_err(|_| ConfigError::MissingVar("CSRF_SECRET"))?,
                cookie_domain: env::var("CSRF_COOKIE_DOMAIN").ok(),
            },
            magic_link: MagicLinkConfig {
                secret: env::var("MAGIC_LINK_SECRET")
                    .map_err(|_| ConfigError::MissingVar("MAGIC_LINK_SECRET"))?,
                base_url: env::var("MAGIC_LINK_BASE_URL")
                    .unwrap_or_else(|_| default_magic_link_base_url()),
                ttl_minutes: env_parsed("MAGIC_LINK_TTL_MINUTES")
                    .unwrap_or_else(default_magic_link_ttl_minutes),
                per_email_hourly_limit: env_parsed("MAGIC_LINK_PER_EMAIL_HOURLY")
                    .unwrap_or_else(default_per_email_hourly_limit),
                per_ip_hourly_limit: env_parsed("MAGIC_LINK_PER_IP_HOURLY")
                    .unwrap_or_else(default_per_ip_hourly_limit),
            },
            abuse: AbuseConfig {
                captcha_threshold: env_parsed("ABUSE_CAPTCHA_THRESHOLD")
                    .unwrap_or_else(default_captcha_threshold),
                max_attempts: env_parsed("ABUSE_MAX_ATTEMPTS").unwrap_or_else(default_max_attempts),
                window_seconds: env_parsed("ABUSE_WINDOW_SECONDS")
                    .unwrap_or_else(default_abuse_window),
                base_backoff_seconds: env_parsed("ABUSE_BASE_BACKOFF_SECONDS")
                    .unwrap_or_else(default_base_backoff),
                max_backoff_seconds: env_parsed("ABUSE_MAX_BACKOFF_SECONDS")
                    .unwrap_or_else(default_max_backoff),
            },
            captcha,
            email: EmailConfig {
                smtp_host: env::var("SMTP_HOST").ok(),
                smtp_port: env_parsed("SMTP_PORT").unwrap_or_else(default_smtp_port),
                smtp_username: env::var("SMTP_USERNAME").ok(),
                smtp_password: env::var("SMTP_PASSWORD").ok(),
                from_address: env::var("SMTP_FROM").unwrap_or_else(|_| default_email_from()),
                tls_mode: env::var("SMTP_TLS").unwrap_or_else(|_| default_smtp_tls()),
            },
            session: SessionConfig {
                cleanup_retention_days: env_parsed("SESSION_CLEANUP_RETENTION_DAYS")
                    .unwrap_or_else(default_cleanup_retention_days),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: env_parsed("RATE_LIMIT_REQUESTS_PER_SECOND")
                    .unwrap_or_else(default_requests_per_second),
                burst: env_parsed("RATE_LIMIT_BURST").unwrap_or_else(default_burst),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .ok()
                    .map(|s| s.split(',').map(str::trim).map(String::from).collect())
                    .unwrap_or_default(),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
