//! Tracing subscriber initialization
//!
//! Pretty output for development, JSON lines for production. The filter
//! honors `RUST_LOG` when set.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when RUST_LOG is not set
    pub level: Level,
    /// Emit JSON lines instead of pretty output
    pub json: bool,
    /// Include file/line locations
    pub file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            file_line: true,
        }
    }
}

impl TracingConfig {
    /// Development profile: verbose pretty output
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json: false,
            file_line: true,
        }
    }

    /// Production profile: JSON without source locations
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json: true,
            file_line: false,
        }
    }
}

/// Initialize the global tracing subscriber
///
/// # Panics
/// Panics if a global subscriber is already set; use [`try_init_tracing`]
/// when double initialization is possible (tests).
pub fn init_tracing(config: &TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.file_line)
                    .with_line_number(config.file_line),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_file(config.file_line)
                    .with_line_number(config.file_line),
            )
            .init();
    }
}

/// Try to initialize tracing, returning an error instead of panicking when a
/// subscriber is already installed
pub fn try_init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.file_line)
                    .with_line_number(config.file_line),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_file(config.file_line)
                    .with_line_number(config.file_line),
            )
            .try_init()
    };

    result.map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(TracingConfig::development().level, Level::DEBUG);
        assert!(TracingConfig::production().json);
    }

    // The global subscriber can only be installed once per process, so
    // init behavior is exercised by the integration tests.
}
