//! Application state
//!
//! Holds the shared state for the Axum application including the service
//! context and configuration.

use std::sync::Arc;

use gate_common::{AppConfig, CsrfManager, TokenManager};
use gate_service::ServiceContext;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Service context containing all dependencies
    service_context: Arc<ServiceContext>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service_context: ServiceContext, config: Arc<AppConfig>) -> Self {
        Self {
            service_context: Arc::new(service_context),
            config,
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the token manager from the service context
    pub fn token_manager(&self) -> &TokenManager {
        self.service_context.token_manager()
    }

    /// Get the CSRF manager from the service context
    pub fn csrf_manager(&self) -> &CsrfManager {
        self.service_context.csrf_manager()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_context", &"ServiceContext")
            .field("config", &"AppConfig")
            .finish()
    }
}
