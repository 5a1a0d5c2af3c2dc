//! API Integration Tests
//!
//! These tests require:
//! - Running PostgreSQL instance with the gate-db migrations applied
//! - Running Redis instance
//! - Environment variables: DATABASE_URL, REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test api_tests
//!
//! Without the environment the tests are skipped.

use integration_tests::{assert_json, assert_status, check_test_env, fixtures::*, TestServer};
use reqwest::StatusCode;

// ============================================================================
// Health Checks
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_health_ready() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

// ============================================================================
// Registration and Login
// ============================================================================

#[tokio::test]
async fn test_register_and_login() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();

    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();
    assert_eq!(auth.user.email, request.email);
    assert_eq!(auth.token_type, "Bearer");
    assert!(!auth.access_token.is_empty());
    assert!(!auth.refresh_token.is_empty());
    assert!(auth.expires_in > 0);

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::from_register(&request))
        .await
        .unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(auth.user.email, request.email);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();

    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();

    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    assert_status(response, StatusCode::CONFLICT).await.unwrap();
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::wrong_password(&request))
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.code, "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_unknown_email_matches_wrong_password() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");

    // No such account: same code as a wrong password, no enumeration signal.
    let login = LoginRequest {
        email: format!("ghost{}@example.com", unique_suffix()),
        password: "TestPass123!".to_string(),
        remember_me: false,
        captcha_token: None,
    };
    let response = server.post("/api/v1/auth/login", &login).await.unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.code, "INVALID_CREDENTIALS");
}

// ============================================================================
// Refresh Rotation and Replay
// ============================================================================

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();

    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: auth.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    let rotated: AuthResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_ne!(rotated.refresh_token, auth.refresh_token);

    // The rotated-to token keeps working.
    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: rotated.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_replaying_rotated_token_kills_the_family() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();

    // First refresh succeeds and rotates the JTI.
    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: auth.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    let rotated: AuthResponse = assert_json(response, StatusCode::OK).await.unwrap();

    // Replaying the original token must fail with a generic error...
    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: auth.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.code, "INVALID_TOKEN");

    // ...and revoke the whole family: the legitimately rotated-to token is
    // dead as well.
    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: rotated.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_refresh_with_access_token_is_rejected() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();

    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: auth.access_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

// ============================================================================
// Sessions, CSRF, Logout
// ============================================================================

#[tokio::test]
async fn test_session_listing_and_csrf_guarded_logout() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();

    // One active session after registration.
    let response = server
        .get_auth("/api/v1/auth/sessions", &auth.access_token)
        .await
        .unwrap();
    let sessions: Vec<SessionResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(sessions.len(), 1);

    // Logout without the double-submit token is refused by the CSRF guard.
    let response = server
        .post_auth(
            "/api/v1/auth/logout",
            &auth.access_token,
            &serde_json::json!({}),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    // Fetch the CSRF token, then logout succeeds.
    #[derive(serde::Deserialize)]
    struct CsrfBody {
        csrf_token: String,
    }
    let response = server
        .get_auth("/api/v1/auth/csrf", &auth.access_token)
        .await
        .unwrap();
    let csrf: CsrfBody = assert_json(response, StatusCode::OK).await.unwrap();

    let response = server
        .post_auth_csrf(
            "/api/v1/auth/logout",
            &auth.access_token,
            &csrf.csrf_token,
            &serde_json::json!({ "refresh_token": auth.refresh_token }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    // The revoked family cannot refresh anymore.
    let response = server
        .post(
            "/api/v1/auth/refresh",
            &RefreshRequest {
                refresh_token: auth.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

// ============================================================================
// Abuse Control
// ============================================================================

#[tokio::test]
async fn test_repeated_failures_hit_the_backoff_wall() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();

    // Five wrong passwords: all rejected as invalid credentials (the test
    // config disables CAPTCHA, so the middle tier passes through).
    for _ in 0..5 {
        let response = server
            .post("/api/v1/auth/login", &LoginRequest::wrong_password(&request))
            .await
            .unwrap();
        let error: ErrorResponse =
            assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
        assert_eq!(error.code, "INVALID_CREDENTIALS");
    }

    // The sixth attempt is blocked before the credential check, with a
    // Retry-After hint.
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::wrong_password(&request))
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::TOO_MANY_REQUESTS)
        .await
        .unwrap();
    assert_eq!(error.code, "RATE_LIMITED");
    assert!(error.retry_after.unwrap_or(0) > 0);

    // Even the correct password is blocked while the backoff runs.
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::from_register(&request))
        .await
        .unwrap();
    assert_status(response, StatusCode::TOO_MANY_REQUESTS)
        .await
        .unwrap();
}

// ============================================================================
// Magic Links
// ============================================================================

#[tokio::test]
async fn test_magic_link_request_is_enumeration_safe() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");

    // Unknown and known addresses get the identical accepted response.
    let unknown = MagicLinkRequest {
        email: format!("new{}@example.com", unique_suffix()),
        return_to: Some("/listings".to_string()),
    };
    let response = server.post("/api/v1/auth/magic-link", &unknown).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();

    let request = RegisterRequest::unique();
    let response = server.post("/api/v1/auth/register", &request).await.unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();

    let known = MagicLinkRequest {
        email: request.email.clone(),
        return_to: None,
    };
    let response = server.post("/api/v1/auth/magic-link", &known).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
}

#[tokio::test]
async fn test_magic_link_consume_rejects_forged_tokens() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");

    let body = serde_json::json!({
        "token": format!("{}.{}.forged-signature", uuid::Uuid::new_v4(), chrono::Utc::now().timestamp()),
        "email": "victim@example.com",
    });
    let response = server
        .post("/api/v1/auth/magic-link/consume", &body)
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.code, "MAGIC_LINK_INVALID");
}
