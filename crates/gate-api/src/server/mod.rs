//! Server setup and initialization
//!
//! Wires every dependency exactly once at bootstrap (no globals, no lazy
//! singletons) and hands the resulting context to the router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use gate_cache::{AbuseStore, RedisPool};
use gate_common::{AppConfig, AppError, CsrfManager, TokenManager};
use gate_db::{create_pool, PgMagicLinkRepository, PgSessionRepository, PgUserRepository};
use gate_service::{
    HttpCaptchaVerifier, Mailer, NoopMailer, ServiceContextBuilder, SmtpMailer,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::middleware::apply_middleware;
use crate::routes::{create_router, health_routes};
use crate::state::AppState;

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let config = state.config().clone();
    let router = apply_middleware(
        create_router(),
        &state,
        &config.rate_limit,
        &config.cors,
        config.app.env.is_production(),
    );

    // Health endpoints bypass the rate limiter and CSRF guard.
    router.merge(health_routes()).with_state(state)
}

/// Initialize all dependencies and create AppState
pub async fn create_app_state(config: AppConfig) -> Result<AppState, AppError> {
    let config = Arc::new(config);

    // Create database pool
    info!("Connecting to PostgreSQL...");
    let db_config = gate_db::DatabaseConfig::from_app_config(&config.database);
    let pool = create_pool(&db_config)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("PostgreSQL connection established");

    // Create Redis pool
    info!("Connecting to Redis...");
    let redis_pool =
        RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;
    info!("Redis pool ready");

    // Crypto services
    let token_manager = Arc::new(TokenManager::from_config(&config.jwt));
    let csrf_manager = Arc::new(CsrfManager::new(&config.csrf.secret));

    // External collaborators
    let mailer: Arc<dyn Mailer> = if config.email.has_smtp() {
        Arc::new(SmtpMailer::from_config(&config.email)?)
    } else {
        info!("SMTP not configured; magic-link emails will be logged only");
        Arc::new(NoopMailer)
    };
    let captcha = HttpCaptchaVerifier::from_config(&config.captcha);

    // Build service context
    let service_context = ServiceContextBuilder::new()
        .pool(pool.clone())
        .config(config.clone())
        .user_repo(Arc::new(PgUserRepository::new(pool.clone())))
        .session_repo(Arc::new(PgSessionRepository::new(pool.clone())))
        .magic_link_repo(Arc::new(PgMagicLinkRepository::new(pool)))
        .abuse_store(AbuseStore::new(redis_pool, config.abuse.window_seconds))
        .token_manager(token_manager)
        .csrf_manager(csrf_manager)
        .mailer(mailer)
        .captcha(captcha)
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    Ok(AppState::new(service_context, config))
}

/// Run the HTTP server until shutdown
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    let state = create_app_state(config).await?;
    let app = create_app(state);

    run_server(app, addr).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
