//! Service context - dependency container for services
//!
//! Every dependency is constructed once at process bootstrap and injected
//! here; services hold a reference to the context and nothing reaches for
//! globals or the environment at request time.

use std::sync::Arc;

use gate_cache::AbuseStore;
use gate_common::{AppConfig, CsrfManager, TokenManager};
use gate_core::traits::{MagicLinkRepository, SessionRepository, UserRepository};
use gate_db::PgPool;

use super::captcha::CaptchaVerifier;
use super::mailer::Mailer;

/// Service context containing all dependencies
#[derive(Clone)]
pub struct ServiceContext {
    // Database pool (kept for health checks)
    pool: PgPool,

    // Configuration
    config: Arc<AppConfig>,

    // Repositories
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    magic_link_repo: Arc<dyn MagicLinkRepository>,

    // Cache stores
    abuse_store: AbuseStore,

    // Crypto services
    token_manager: Arc<TokenManager>,
    csrf_manager: Arc<CsrfManager>,

    // External collaborators
    mailer: Arc<dyn Mailer>,
    captcha: Arc<dyn CaptchaVerifier>,
}

impl ServiceContext {
    /// Get the PostgreSQL connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the user repository
    pub fn user_repo(&self) -> &dyn UserRepository {
        self.user_repo.as_ref()
    }

    /// Get the session repository
    pub fn session_repo(&self) -> &dyn SessionRepository {
        self.session_repo.as_ref()
    }

    /// Get the magic-link repository
    pub fn magic_link_repo(&self) -> &dyn MagicLinkRepository {
        self.magic_link_repo.as_ref()
    }

    /// Get the abuse-control store
    pub fn abuse_store(&self) -> &AbuseStore {
        &self.abuse_store
    }

    /// Get the token manager
    pub fn token_manager(&self) -> &TokenManager {
        self.token_manager.as_ref()
    }

    /// Get the CSRF manager
    pub fn csrf_manager(&self) -> &CsrfManager {
        self.csrf_manager.as_ref()
    }

    /// Get the mailer
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    /// Get the CAPTCHA verifier
    pub fn captcha(&self) -> &dyn CaptchaVerifier {
        self.captcha.as_ref()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("pool", &"PgPool")
            .field("repositories", &"...")
            .field("abuse_store", &self.abuse_store)
            .finish_non_exhaustive()
    }
}

/// Builder for creating ServiceContext
pub struct ServiceContextBuilder {
    pool: Option<PgPool>,
    config: Option<Arc<AppConfig>>,
    user_repo: Option<Arc<dyn UserRepository>>,
    session_repo: Option<Arc<dyn SessionRepository>>,
    magic_link_repo: Option<Arc<dyn MagicLinkRepository>>,
    abuse_store: Option<AbuseStore>,
    token_manager: Option<Arc<TokenManager>>,
    csrf_manager: Option<Arc<CsrfManager>>,
    mailer: Option<Arc<dyn Mailer>>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            pool: None,
            config: None,
            user_repo: None,
            session_repo: None,
            magic_link_repo: None,
            abuse_store: None,
            token_manager: None,
            csrf_manager: None,
            mailer: None,
            captcha: None,
        }
    }

    pub fn pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn config(mut self, config: Arc<AppConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn user_repo(mut self, repo: Arc<dyn UserRepository>) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn session_repo(mut self, repo: Arc<dyn SessionRepository>) -> Self {
        self.session_repo = Some(repo);
        self
    }

    pub fn magic_link_repo(mut self, repo: Arc<dyn MagicLinkRepository>) -> Self {
        self.magic_link_repo = Some(repo);
        self
    }

    pub fn abuse_store(mut self, store: AbuseStore) -> Self {
        self.abuse_store = Some(store);
        self
    }

    pub fn token_manager(mut self, manager: Arc<TokenManager>) -> Self {
        self.token_manager = Some(manager);
        self
    }

    pub fn csrf_manager(mut self, manager: Arc<CsrfManager>) -> Self {
        self.csrf_manager = Some(manager);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn captcha(mut self, captcha: Arc<dyn CaptchaVerifier>) -> Self {
        self.captcha = Some(captcha);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> super::error::ServiceResult<ServiceContext> {
        use super::error::ServiceError;

        Ok(ServiceContext {
            pool: self
                .pool
                .ok_or_else(|| ServiceError::validation("pool is required"))?,
            config: self
                .config
                .ok_or_else(|| ServiceError::validation("config is required"))?,
            user_repo: self
                .user_repo
                .ok_or_else(|| ServiceError::validation("user_repo is required"))?,
            session_repo: self
                .session_repo
                .ok_or_else(|| ServiceError::validation("session_repo is required"))?,
            magic_link_repo: self
                .magic_link_repo
                .ok_or_else(|| ServiceError::validation("magic_link_repo is required"))?,
            abuse_store: self
                .abuse_store
                .ok_or_else(|| ServiceError::validation("abuse_store is required"))?,
            token_manager: self
                .token_manager
                .ok_or_else(|| ServiceError::validation("token_manager is required"))?,
            csrf_manager: self
                .csrf_manager
                .ok_or_else(|| ServiceError::validation("csrf_manager is required"))?,
            mailer: self
                .mailer
                .ok_or_else(|| ServiceError::validation("mailer is required"))?,
            captcha: self
                .captcha
                .ok_or_else(|| ServiceError::validation("captcha is required"))?,
        })
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
