//! Gatehouse API server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p gate-api
//! ```
//!
//! Configuration is loaded from environment variables (see
//! `gate_common::AppConfig`).

use gate_common::{try_init_tracing, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration first so the environment selects the log format
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let tracing_config = if config.app.env.is_production() {
        TracingConfig::production()
    } else {
        TracingConfig::development()
    };
    if let Err(e) = try_init_tracing(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        port = config.server.port,
        "Starting Gatehouse API server"
    );

    if let Err(e) = gate_api::run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}
