//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and making HTTP requests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use gate_api::{create_app, create_app_state};
use gate_common::AppConfig;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server on an ephemeral port
    pub async fn start() -> Result<Self> {
        let config = test_config()?;
        Self::start_with_config(config).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let state = create_app_state(config).await?;
        let app = create_app(state);

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let actual_addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Wait for server to be ready
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr: actual_addr,
            client,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a POST request with auth token
    pub async fn post_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await?)
    }

    /// Make a POST request with auth token plus CSRF cookie and header
    pub async fn post_auth_csrf<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        csrf_token: &str,
        body: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("x-csrf-token", csrf_token)
            .header("Cookie", format!("csrf_token={csrf_token}"))
            .json(body)
            .send()
            .await?)
    }
}

/// Create a test configuration from the environment
pub fn test_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    // Secrets that are usually mandatory get test defaults so only the
    // store URLs have to be provided.
    for (key, value) in [
        ("API_PORT", "0"),
        ("JWT_SECRET", "integration-test-jwt-secret"),
        ("CSRF_SECRET", "integration-test-csrf-secret"),
        ("MAGIC_LINK_SECRET", "integration-test-magic-secret"),
        ("CAPTCHA_ENABLED", "false"),
        ("RATE_LIMIT_REQUESTS_PER_SECOND", "1000"),
        ("RATE_LIMIT_BURST", "1000"),
    ] {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }

    AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// Helper to check if the test environment is available
pub async fn check_test_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }

    true
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}
